use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::extractor::{ExtractLimits, Extractor};
use crate::fetcher::SourceFetcher;
use crate::listing::{JobListing, ListingBuilder, Query, SourceTag};
use crate::sources::SourceProfile;
use crate::synthetic;

/// Anything the aggregator can fan a query out to.
#[async_trait]
pub trait ListingSource: Send + Sync {
    fn tag(&self) -> SourceTag;

    async fn scrape(&self, query: &Query) -> Result<Vec<JobListing>>;
}

/// Runs one [`SourceProfile`]: URL variants in order until one yields
/// listings, then synthetic top-up below the profile threshold.
pub struct SourceScraper {
    profile: SourceProfile,
    extractor: Extractor,
    fetcher: Arc<SourceFetcher>,
    synthetic: bool,
}

impl SourceScraper {
    pub fn new(profile: SourceProfile, fetcher: Arc<SourceFetcher>, limits: ExtractLimits) -> Self {
        Self {
            extractor: profile.extractor(limits),
            profile,
            fetcher,
            synthetic: true,
        }
    }

    pub fn with_synthetic(mut self, enabled: bool) -> Self {
        self.synthetic = enabled;
        self
    }

    async fn scrape_real(&self, query: &Query) -> Vec<JobListing> {
        let tag = self.profile.tag;

        for url in self.profile.urls(query) {
            let document = match self.fetcher.fetch(&url, self.profile.referer.as_deref()).await {
                Ok(document) => document,
                Err(e) => {
                    debug!(source = %tag, url = %url, error = %e, "No usable document, trying next variant");
                    continue;
                }
            };

            let builder = ListingBuilder {
                source: tag,
                default_location: &query.location,
                page_url: Some(document.url.as_str()),
            };
            let extraction = self.extractor.extract(&document.html, &builder);
            if !extraction.listings.is_empty() {
                return extraction.listings;
            }
            debug!(source = %tag, url = %url, "Document accepted but nothing extracted");
        }

        Vec::new()
    }
}

#[async_trait]
impl ListingSource for SourceScraper {
    fn tag(&self) -> SourceTag {
        self.profile.tag
    }

    async fn scrape(&self, query: &Query) -> Result<Vec<JobListing>> {
        let tag = self.profile.tag;
        let mut listings = self.scrape_real(query).await;
        let real = listings.len();

        let shortfall = self.profile.min_results.saturating_sub(real);
        if shortfall > 0 && self.synthetic {
            listings.extend(synthetic::generate(
                &query.keyword,
                &query.location,
                shortfall,
                &mut rand::rng(),
            ));
            info!(source = %tag, real, synthetic = shortfall, "Topped up with synthetic listings");
        } else if real == 0 {
            warn!(source = %tag, "No listings extracted");
        } else {
            debug!(source = %tag, count = real, "Scraped listings");
        }

        Ok(listings)
    }
}

/// Synthetic-only source drawn from a fixed table of well-paying employers.
/// Tagged `premium` so it is never mistaken for scraped data.
#[derive(Debug, Default, Clone, Copy)]
pub struct PremiumSource;

#[async_trait]
impl ListingSource for PremiumSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Premium
    }

    async fn scrape(&self, query: &Query) -> Result<Vec<JobListing>> {
        Ok(synthetic::premium(&query.keyword, &query.location, &mut rand::rng()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::SelectorSet;
    use crate::fetcher::{HttpResponse, RequestHeaders, ResponseRules, RetryPolicy, Transport};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies by URL; unknown URLs 404.
    struct Pages {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for Pages {
        async fn get(&self, url: &str, _headers: &RequestHeaders) -> Result<HttpResponse> {
            self.requested.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(body) => Ok(HttpResponse {
                    status: 200,
                    body: body.clone(),
                }),
                None => Ok(HttpResponse {
                    status: 404,
                    body: String::new(),
                }),
            }
        }

        fn name(&self) -> &str {
            "pages"
        }
    }

    fn cards(titles: &[&str]) -> String {
        let cards: String = titles
            .iter()
            .map(|t| {
                format!(r#"<article class="card"><a class="t" href="/job/{t}">{t}</a><span class="c">Zoho Corp</span></article>"#)
            })
            .collect();
        format!("<html><body>{cards}<!-- {} --></body></html>", "x".repeat(1200))
    }

    fn profile(min_results: usize) -> SourceProfile {
        let set = SelectorSet::new("article.card", &["a.t"])
            .and_then(|s| s.company(&[".c"]))
            .unwrap();
        SourceProfile::new(
            SourceTag::Naukri,
            &["https://a.test/{keyword_slug}", "https://b.test/{keyword_slug}", "https://c.test/{keyword_slug}"],
            vec![set],
        )
        .min_results(min_results)
    }

    fn build_scraper(pages: &[(&str, String)], min_results: usize) -> (SourceScraper, Arc<Pages>) {
        let transport = Arc::new(Pages {
            pages: pages.iter().map(|(u, b)| (u.to_string(), b.clone())).collect(),
            requested: Mutex::new(Vec::new()),
        });
        let fetcher = SourceFetcher::new(transport.clone(), RetryPolicy::immediate(1), ResponseRules::default());
        let scraper = SourceScraper::new(profile(min_results), Arc::new(fetcher), ExtractLimits::default());
        (scraper, transport)
    }

    fn query() -> Query {
        Query::new("rust developer", "Pune", 30)
    }

    #[tokio::test]
    async fn stops_at_first_variant_with_listings() {
        let (scraper, transport) = build_scraper(
            &[
                ("https://b.test/rust-developer", cards(&["Rust Developer", "Senior Rust Developer"])),
                ("https://c.test/rust-developer", cards(&["Never Requested"])),
            ],
            2,
        );

        let listings = scraper.scrape(&query()).await.unwrap();

        assert_eq!(listings.len(), 2);
        assert!(listings.iter().all(|l| l.source == SourceTag::Naukri && !l.synthetic));
        assert_eq!(listings[0].apply_link, "https://b.test/job/Rust%20Developer");
        assert_eq!(listings[0].location, "Pune");
        assert_eq!(
            *transport.requested.lock().unwrap(),
            vec!["https://a.test/rust-developer", "https://b.test/rust-developer"]
        );
    }

    #[tokio::test]
    async fn tops_up_below_threshold() {
        let (scraper, _) = build_scraper(&[("https://a.test/rust-developer", cards(&["Rust Developer"]))], 5);

        let listings = scraper.scrape(&query()).await.unwrap();

        assert_eq!(listings.len(), 5);
        assert!(!listings[0].synthetic);
        assert!(listings[1..]
            .iter()
            .all(|l| l.source == SourceTag::Synthetic && l.synthetic));
    }

    #[tokio::test]
    async fn all_variants_failing_is_not_an_error() {
        let (scraper, transport) = build_scraper(&[], 4);

        let listings = scraper.scrape(&query()).await.unwrap();

        assert_eq!(listings.len(), 4);
        assert!(listings.iter().all(|l| l.source == SourceTag::Synthetic));
        assert_eq!(transport.requested.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn without_synthetic_a_dead_source_is_empty() {
        let (scraper, _) = build_scraper(&[], 4);
        let scraper = scraper.with_synthetic(false);
        assert!(scraper.scrape(&query()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn short_bodies_are_skipped() {
        let (scraper, _) = build_scraper(
            &[("https://a.test/rust-developer", "<html><body>tiny</body></html>".to_string())],
            0,
        );
        assert!(scraper.scrape(&query()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn premium_source_is_synthetic_only() {
        let listings = PremiumSource.scrape(&query()).await.unwrap();
        assert!(!listings.is_empty());
        assert!(listings.iter().all(|l| l.source == SourceTag::Premium && l.synthetic));
        assert_eq!(PremiumSource.tag(), SourceTag::Premium);
    }
}
