//! Layered listing extraction.
//!
//! A document is run through an ordered chain of strategies, most precise
//! first. The first strategy that yields any listing wins and the rest are
//! skipped; results are never merged across strategies.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::listing::{JobListing, ListingBuilder, RawFields};
use crate::utils::collapse_whitespace;

static ROLE_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(developer|engineer|analyst|manager|architect|designer|consultant|scientist|programmer|administrator|specialist|lead|intern|tester|devops)\b",
    )
    .expect("role regex")
});

static COMPANY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(ltd|limited|pvt|private|inc|llc|llp|corp|corporation|technologies|technology|solutions|systems|services|software|labs|consulting|infotech)\b",
    )
    .expect("company regex")
});

/// Matched against a candidate card's class attribute or its text.
static JOB_HINTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)job|position|vacancy|opening|posting|listing|career|developer|engineer|analyst|manager|architect|designer|consultant|scientist|programmer|tester|intern",
    )
    .expect("job hint regex")
});

static BLOCK_ELEMENTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article, li, div, section, tr").expect("block selector"));

static TITLE_HEADINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3").expect("heading selector"));

static MINOR_HEADINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h4, h5").expect("heading selector"));

static ANCHORS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("anchor selector"));

static LINKS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").expect("link selector"));

/// Generic field selectors used on pseudo-containers.
static GENERIC: LazyLock<FieldSelectors> = LazyLock::new(|| {
    let parse = |list: &[&str]| parse_all(list).expect("generic selectors");
    FieldSelectors {
        title: parse(&["h2 a", "h3 a", "h1 a", "h2", "h3", "h1", "h4 a", "h4", "a"]),
        company: parse(&[
            "[class*='company']",
            "[class*='employer']",
            "[class*='org-name']",
            "[data-company]",
            "h4",
            "h5",
        ]),
        location: parse(&["[class*='location']", "[class*='locality']"]),
        salary: parse(&["[class*='salary']", "[class*='compensation']"]),
        experience: parse(&["[class*='experience']", "[class*='exp']"]),
        posted: parse(&["time", "[class*='posted']", "[class*='date']"]),
    }
});

/// Heuristic containers longer than this are page sections, not cards.
const MAX_PSEUDO_CONTAINER_TEXT: usize = 400;
/// Text-mining only looks at blocks with a handful of lines.
const TEXT_BLOCK_LINES: std::ops::RangeInclusive<usize> = 2..=15;
const MINED_TITLE_CHARS: std::ops::RangeInclusive<usize> = 10..=100;
const MINED_COMPANY_CHARS: std::ops::RangeInclusive<usize> = 3..=50;

pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScrapeError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn parse_all(selectors: &[&str]) -> Result<Vec<Selector>> {
    selectors.iter().map(|s| parse_selector(s)).collect()
}

/// Per-field sub-selectors, tried in order until one yields text.
#[derive(Debug, Clone, Default)]
pub struct FieldSelectors {
    pub title: Vec<Selector>,
    pub company: Vec<Selector>,
    pub location: Vec<Selector>,
    pub salary: Vec<Selector>,
    pub experience: Vec<Selector>,
    pub posted: Vec<Selector>,
}

/// One ranked (container, fields...) tuple of the structured strategy.
#[derive(Debug, Clone)]
pub struct SelectorSet {
    pub container: Selector,
    pub fields: FieldSelectors,
}

impl SelectorSet {
    pub fn new(container: &str, title: &[&str]) -> Result<Self> {
        Ok(Self {
            container: parse_selector(container)?,
            fields: FieldSelectors {
                title: parse_all(title)?,
                ..Default::default()
            },
        })
    }

    pub fn company(mut self, selectors: &[&str]) -> Result<Self> {
        self.fields.company = parse_all(selectors)?;
        Ok(self)
    }

    pub fn location(mut self, selectors: &[&str]) -> Result<Self> {
        self.fields.location = parse_all(selectors)?;
        Ok(self)
    }

    pub fn salary(mut self, selectors: &[&str]) -> Result<Self> {
        self.fields.salary = parse_all(selectors)?;
        Ok(self)
    }

    pub fn experience(mut self, selectors: &[&str]) -> Result<Self> {
        self.fields.experience = parse_all(selectors)?;
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub enum Strategy {
    /// Ranked selector tuples; the first tuple that yields listings wins.
    Structured(Vec<SelectorSet>),
    /// Job-looking elements treated as containers with generic selectors.
    Heuristic,
    /// Line-based title and company regexes over small text blocks.
    TextMining,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Structured(_) => StrategyKind::Structured,
            Strategy::Heuristic => StrategyKind::Heuristic,
            Strategy::TextMining => StrategyKind::TextMining,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Structured,
    Heuristic,
    TextMining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    /// A title must be strictly longer than this.
    pub min_title_chars: usize,
    pub max_per_document: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            min_title_chars: 5,
            max_per_document: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Extraction {
    /// The strategy that produced the listings; `None` when every tier missed.
    pub strategy: Option<StrategyKind>,
    pub listings: Vec<JobListing>,
}

#[derive(Debug, Clone)]
pub struct Extractor {
    chain: Vec<Strategy>,
    limits: ExtractLimits,
}

impl Extractor {
    pub fn new(chain: Vec<Strategy>, limits: ExtractLimits) -> Self {
        Self { chain, limits }
    }

    /// Structured tuples followed by the heuristic and text-mining fallbacks.
    pub fn with_fallbacks(selector_sets: Vec<SelectorSet>, limits: ExtractLimits) -> Self {
        let mut chain = Vec::with_capacity(3);
        if !selector_sets.is_empty() {
            chain.push(Strategy::Structured(selector_sets));
        }
        chain.push(Strategy::Heuristic);
        chain.push(Strategy::TextMining);
        Self::new(chain, limits)
    }

    pub fn extract(&self, html: &str, builder: &ListingBuilder<'_>) -> Extraction {
        let document = Html::parse_document(html);
        let page_url = builder.page_url.and_then(|u| Url::parse(u).ok());

        for strategy in &self.chain {
            let fields = match strategy {
                Strategy::Structured(sets) => self.structured(&document, sets, page_url.as_ref()),
                Strategy::Heuristic => self.heuristic(&document, page_url.as_ref()),
                Strategy::TextMining => self.text_mining(&document),
            };

            let listings: Vec<JobListing> = fields
                .into_iter()
                .filter_map(|raw| builder.build(raw))
                .take(self.limits.max_per_document)
                .collect();

            if !listings.is_empty() {
                debug!(
                    source = %builder.source,
                    strategy = ?strategy.kind(),
                    count = listings.len(),
                    "Extraction strategy matched"
                );
                return Extraction {
                    strategy: Some(strategy.kind()),
                    listings,
                };
            }
        }

        Extraction {
            strategy: None,
            listings: Vec::new(),
        }
    }

    fn structured(&self, document: &Html, sets: &[SelectorSet], page_url: Option<&Url>) -> Vec<RawFields> {
        for set in sets {
            let found: Vec<RawFields> = document
                .select(&set.container)
                .filter_map(|container| self.fields_from(container, &set.fields, page_url))
                .take(self.limits.max_per_document)
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    fn heuristic(&self, document: &Html, page_url: Option<&Url>) -> Vec<RawFields> {
        let candidates: Vec<ElementRef> = document
            .select(&BLOCK_ELEMENTS)
            .filter(|el| looks_like_job_card(*el))
            .collect();
        let ids: HashSet<_> = candidates.iter().map(|el| el.id()).collect();

        // Keep the outermost card when cards nest.
        candidates
            .into_iter()
            .filter(|el| !el.ancestors().any(|a| ids.contains(&a.id())))
            .filter_map(|el| self.fields_from(el, &GENERIC, page_url))
            .take(self.limits.max_per_document)
            .collect()
    }

    fn text_mining(&self, document: &Html) -> Vec<RawFields> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for block in document.select(&BLOCK_ELEMENTS) {
            let lines = text_lines(block);
            if !TEXT_BLOCK_LINES.contains(&lines.len()) {
                continue;
            }
            let Some((title, company)) = mine_lines(&lines) else {
                continue;
            };
            if seen.insert((title.to_lowercase(), company.to_lowercase())) {
                found.push(RawFields {
                    title,
                    company: Some(company),
                    ..Default::default()
                });
                if found.len() >= self.limits.max_per_document {
                    break;
                }
            }
        }
        found
    }

    fn fields_from(&self, container: ElementRef, fields: &FieldSelectors, page_url: Option<&Url>) -> Option<RawFields> {
        let (title_el, title) = fields.title.iter().find_map(|sel| {
            container.select(sel).find_map(|el| {
                let text = element_value(el);
                (text.chars().count() > self.limits.min_title_chars).then_some((el, text))
            })
        })?;

        let company = first_text(container, &fields.company)
            .filter(|company| *company != title)
            .or_else(|| {
                // Fall back to a mined company line inside the container.
                text_lines(container)
                    .into_iter()
                    .find(|line| is_company_line(line) && *line != title)
            });

        Some(RawFields {
            link: link_for(title_el, page_url),
            company,
            location: first_text(container, &fields.location),
            salary: first_text(container, &fields.salary),
            experience: first_text(container, &fields.experience),
            posted: first_text(container, &fields.posted),
            title,
        })
    }
}

fn looks_like_job_card(el: ElementRef) -> bool {
    let class_hit = el.value().attr("class").is_some_and(|c| JOB_HINTS.is_match(c));

    let text_hit = || {
        let text = collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "));
        text.chars().count() <= MAX_PSEUDO_CONTAINER_TEXT && JOB_HINTS.is_match(&text)
    };

    // h4/h5 usually carry the company; they only count when nothing ranks higher.
    let single_title = match el.select(&TITLE_HEADINGS).count() {
        1 => true,
        0 => {
            el.select(&MINOR_HEADINGS).count() == 1
                || el
                    .select(&ANCHORS)
                    .filter(|a| ROLE_WORDS.is_match(&element_value(*a)))
                    .count()
                    == 1
        }
        _ => false,
    };

    single_title && (class_hit || text_hit())
}

/// `title` attribute when present, otherwise the collapsed text.
fn element_value(el: ElementRef) -> String {
    el.value()
        .attr("title")
        .map(collapse_whitespace)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
}

fn first_text(container: ElementRef, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        container
            .select(sel)
            .map(element_value)
            .find(|text| !text.is_empty())
    })
}

fn link_for(title_el: ElementRef, page_url: Option<&Url>) -> Option<String> {
    let href = match title_el.value().attr("href") {
        Some(href) => href,
        None => title_el.select(&LINKS).next()?.value().attr("href")?,
    };
    resolve_link(href, page_url)
}

pub fn resolve_link(href: &str, page_url: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    match Url::parse(href) {
        Ok(absolute) => Some(absolute.to_string()),
        Err(_) => page_url?.join(href).ok().map(|u| u.to_string()),
    }
}

fn text_lines(el: ElementRef) -> Vec<String> {
    el.text()
        .flat_map(|node| node.split('\n'))
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect()
}

fn is_title_line(line: &str) -> bool {
    MINED_TITLE_CHARS.contains(&line.chars().count()) && ROLE_WORDS.is_match(line)
}

fn is_company_line(line: &str) -> bool {
    MINED_COMPANY_CHARS.contains(&line.chars().count()) && COMPANY_SUFFIX.is_match(line)
}

/// First title-looking line and first company-looking line, if both exist.
fn mine_lines(lines: &[String]) -> Option<(String, String)> {
    let title = lines.iter().find(|l| is_title_line(l))?;
    let company = lines.iter().find(|l| *l != title && is_company_line(l))?;
    Some((title.clone(), company.clone()))
}
