//! The process-wide entry point: one [`ScraperService`] owns the sources,
//! the aggregator and the result cache, and is shared by reference.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::aggregator::Aggregator;
use crate::cache::ResultCache;
use crate::config::ScraperConfig;
use crate::error::Result;
use crate::extractor::ExtractLimits;
use crate::fetcher::{ReqwestTransport, SourceFetcher, Transport};
use crate::listing::{JobListing, Query, SearchResponse, SearchSummary, SourceReport, SourceStatus};
use crate::source_scraper::{ListingSource, PremiumSource, SourceScraper};
use crate::sources::default_profiles;

pub struct ScraperService {
    config: ScraperConfig,
    aggregator: Aggregator,
    cache: ResultCache,
}

impl ScraperService {
    /// Live HTTP against every built-in board.
    pub fn from_config(config: ScraperConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        Self::with_transport(config, transport)
    }

    /// Built-in boards over a caller-supplied transport.
    pub fn with_transport(config: ScraperConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let fetcher = Arc::new(SourceFetcher::new(
            transport,
            config.retry_policy(),
            config.response_rules(),
        ));

        let mut sources: Vec<Arc<dyn ListingSource>> = Vec::new();
        for profile in default_profiles()? {
            let scraper = SourceScraper::new(profile, Arc::clone(&fetcher), ExtractLimits::default())
                .with_synthetic(config.synthetic);
            sources.push(Arc::new(scraper));
        }
        if config.premium {
            sources.push(Arc::new(PremiumSource));
        }

        Ok(Self::with_sources(config, sources))
    }

    pub fn with_sources(config: ScraperConfig, sources: Vec<Arc<dyn ListingSource>>) -> Self {
        let aggregator = Aggregator::new(sources)
            .workers(config.workers)
            .deadline(config.deadline);
        let cache = ResultCache::new(config.cache_ttl);
        Self {
            config,
            aggregator,
            cache,
        }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Never fails: a dead board degrades to synthetic or empty results.
    pub async fn search(&self, query: &Query) -> SearchResponse {
        let started = Instant::now();
        let max_results = self.config.clamp_max_results(query.max_results);

        // Cached at the limit so one entry serves every caller bound.
        let at_limit = query.with_max_results(self.config.max_results_limit);
        let (entry, cached) = self
            .cache
            .get_or_compute(&query.keyword, &query.location, || self.aggregator.aggregate(&at_limit))
            .await;

        let jobs: Vec<JobListing> = entry.aggregation.listings.iter().take(max_results).cloned().collect();
        let summary = summarize(&jobs, &entry.aggregation.reports, cached, started.elapsed());

        info!(
            keyword = %query.keyword,
            location = %query.location,
            total = summary.total_jobs,
            synthetic = summary.synthetic_jobs,
            cached,
            "Search served"
        );

        SearchResponse {
            keyword: query.keyword.clone(),
            location: query.location.clone(),
            jobs,
            summary,
        }
    }
}

pub fn summarize(jobs: &[JobListing], reports: &[SourceReport], cached: bool, elapsed: Duration) -> SearchSummary {
    let mut platform_breakdown = BTreeMap::new();
    for job in jobs {
        *platform_breakdown.entry(job.source).or_insert(0) += 1;
    }

    SearchSummary {
        total_jobs: jobs.len(),
        platform_breakdown,
        synthetic_jobs: jobs.iter().filter(|j| j.synthetic).count(),
        platforms_successful: reports.iter().filter(|r| r.status == SourceStatus::Ok).count(),
        platforms_failed: reports
            .iter()
            .filter(|r| matches!(r.status, SourceStatus::Failed | SourceStatus::TimedOut))
            .count(),
        platforms: reports.to_vec(),
        cached,
        duration_seconds: (elapsed.as_secs_f64() * 100.0).round() / 100.0,
    }
}
