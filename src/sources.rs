//! Per-platform profiles.
//!
//! Each job board is a row of data: URL variants, a referer, ranked selector
//! sets and a top-up threshold. One [`crate::source_scraper::SourceScraper`]
//! runs any profile, so adding a board means adding a row here.

use crate::error::Result;
use crate::extractor::{ExtractLimits, Extractor, SelectorSet};
use crate::listing::{Query, SourceTag};
use crate::utils::{encode_query, slugify};

#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub tag: SourceTag,
    /// Tried in order; placeholders are `{keyword}`, `{keyword_slug}`,
    /// `{location}` and `{location_slug}`.
    pub url_templates: Vec<String>,
    pub referer: Option<String>,
    pub selector_sets: Vec<SelectorSet>,
    /// Fewer real listings than this are topped up with synthetic ones.
    pub min_results: usize,
}

impl SourceProfile {
    pub fn new(tag: SourceTag, url_templates: &[&str], selector_sets: Vec<SelectorSet>) -> Self {
        Self {
            tag,
            url_templates: url_templates.iter().map(|t| t.to_string()).collect(),
            referer: None,
            selector_sets,
            min_results: 5,
        }
    }

    pub fn referer(mut self, referer: &str) -> Self {
        self.referer = Some(referer.to_string());
        self
    }

    pub fn min_results(mut self, min_results: usize) -> Self {
        self.min_results = min_results;
        self
    }

    /// Concrete URLs for `query`, in variant order.
    pub fn urls(&self, query: &Query) -> Vec<String> {
        self.url_templates
            .iter()
            .map(|template| render(template, query))
            .collect()
    }

    pub fn extractor(&self, limits: ExtractLimits) -> Extractor {
        Extractor::with_fallbacks(self.selector_sets.clone(), limits)
    }
}

fn render(template: &str, query: &Query) -> String {
    template
        .replace("{keyword_slug}", &slugify(&query.keyword))
        .replace("{location_slug}", &slugify(&query.location))
        .replace("{keyword}", &encode_query(&query.keyword))
        .replace("{location}", &encode_query(&query.location))
}

/// The six boards, in registration (and merge) order.
pub fn default_profiles() -> Result<Vec<SourceProfile>> {
    Ok(vec![naukri()?, linkedin()?, indeed()?, timesjobs()?, glassdoor()?, foundit()?])
}

pub fn naukri() -> Result<SourceProfile> {
    let sets = vec![
        SelectorSet::new("article.jobTuple", &["a.title", "a[title]", "h2 a"])?
            .company(&["a.subTitle", ".companyName", "h4[title]"])?
            .location(&[".location", ".locWdth", "li.location span"])?
            .salary(&[".salary", "li.salary span"])?
            .experience(&[".experience", "li.experience span"])?,
        SelectorSet::new("div.srp-jobtuple-wrapper, div[data-job-id]", &["a[class*='title']", "h2 a", "h3 a", ".title a"])?
            .company(&["a[class*='subTitle']", ".comp-name", ".company-name"])?
            .location(&[".locWdth", ".loc", "[class*='location']"])?
            .salary(&["[class*='sal']"])?
            .experience(&[".expwdth", "[class*='exp']"])?,
        SelectorSet::new("div.jobTuple", &[".title a", "a[title]"])?
            .company(&[".companyName", ".company-name"])?,
    ];
    Ok(SourceProfile::new(
        SourceTag::Naukri,
        &[
            "https://www.naukri.com/{keyword_slug}-jobs-in-{location_slug}",
            "https://www.naukri.com/{keyword_slug}-jobs",
            "https://www.naukri.com/jobs?k={keyword}&l={location}",
        ],
        sets,
    )
    .referer("https://www.naukri.com/")
    .min_results(8))
}

pub fn linkedin() -> Result<SourceProfile> {
    let sets = vec![
        SelectorSet::new("div.base-search-card, div.job-search-card", &["h3.base-search-card__title", "h3 a", ".job-title"])?
            .company(&["h4.base-search-card__subtitle", "h4 a", "h4.company-name"])?
            .location(&[".job-search-card__location"])?,
        SelectorSet::new("li.job-result-card, div.result-card", &["h3", "h4 a", ".job-title"])?
            .company(&[".result-card__subtitle", ".company-name"])?
            .location(&[".job-result-card__location"])?,
    ];
    Ok(SourceProfile::new(
        SourceTag::Linkedin,
        &[
            "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search?keywords={keyword}&location={location}&start=0",
            "https://www.linkedin.com/jobs/search/?keywords={keyword}&location={location}",
        ],
        sets,
    )
    .referer("https://www.linkedin.com/jobs/")
    .min_results(6))
}

pub fn indeed() -> Result<SourceProfile> {
    let sets = vec![
        SelectorSet::new("div.job_seen_beacon", &["h2.jobTitle a span", "h2 a span", ".jobTitle"])?
            .company(&["[data-testid='company-name']", ".companyName"])?
            .location(&["[data-testid='text-location']", ".companyLocation"])?
            .salary(&[".salary-snippet-container", "[class*='salary']"])?,
        SelectorSet::new("div[data-jk], a[data-jk]", &[".jobTitle", "h2 span[title]"])?
            .company(&[".companyName", "[data-testid='company-name']"])?
            .location(&[".companyLocation"])?,
    ];
    Ok(SourceProfile::new(
        SourceTag::Indeed,
        &[
            "https://in.indeed.com/jobs?q={keyword}&l={location}",
            "https://in.indeed.com/jobs?q={keyword}&l={location}&sort=date",
        ],
        sets,
    )
    .referer("https://in.indeed.com/")
    .min_results(6))
}

pub fn timesjobs() -> Result<SourceProfile> {
    let sets = vec![SelectorSet::new("li.clearfix.job-bx", &["h2 a", ".jobTitle"])?
        .company(&["h3.joblist-comp-name"])?
        .location(&["ul.top-jd-dtl li span", ".loc"])?
        .experience(&["ul.top-jd-dtl li:first-child"])?];
    Ok(SourceProfile::new(
        SourceTag::Timesjobs,
        &["https://www.timesjobs.com/candidate/job-search.html?searchType=personalizedSearch&from=submit&txtKeywords={keyword}&txtLocation={location}"],
        sets,
    )
    .referer("https://www.timesjobs.com/"))
}

pub fn glassdoor() -> Result<SourceProfile> {
    let sets = vec![
        SelectorSet::new("li.react-job-listing, li[data-test='jobListing']", &["[data-test='job-title']", ".job-title"])?
            .company(&["[data-test='employer-name']", ".employer-name"])?
            .location(&["[data-test='emp-location']", ".location"])?
            .salary(&["[data-test='detailSalary']"])?,
        SelectorSet::new("div[data-id], div.job-search-item", &[".job-title", "a[data-test='job-link']"])?
            .company(&[".employer-name"])?,
    ];
    Ok(SourceProfile::new(
        SourceTag::Glassdoor,
        &["https://www.glassdoor.co.in/Job/jobs.htm?sc.keyword={keyword}&locT=C&locId=115&locKeyword={location}"],
        sets,
    )
    .referer("https://www.glassdoor.co.in/"))
}

pub fn foundit() -> Result<SourceProfile> {
    let sets = vec![
        SelectorSet::new("div.jobWrapper, div.srpResultCardContainer", &["h3 a", ".jobTitle", ".job-title"])?
            .company(&[".companyName", ".company-name", ".org-name"])?
            .location(&[".details.location", "[class*='location']"])?
            .experience(&[".experience", "[class*='exp']"])?,
        SelectorSet::new("article.job-card, div.card-body", &[".job-title", "h3"])?
            .company(&[".company-name", ".org-name"])?,
    ];
    Ok(SourceProfile::new(
        SourceTag::Foundit,
        &["https://www.foundit.in/srp/results?query={keyword}&locations={location}", "https://www.foundit.in/jobs?query={keyword}&location={location}"],
        sets,
    )
    .referer("https://www.foundit.in/"))
}
