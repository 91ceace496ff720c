//! Multi-board job listing aggregation.
//!
//! A [`ScraperService`] fans a [`Query`] out to every registered source,
//! each of which fetches a board's result pages, extracts listings through a
//! layered strategy chain and tops up with clearly tagged synthetic entries
//! when a board comes back thin. Results are deduplicated, ordered by
//! recency and memoized for a few minutes per `(keyword, location)`.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod extractor;
pub mod fetcher;
pub mod listing;
pub mod source_scraper;
pub mod sources;
pub mod synthetic;
pub mod utils;

pub mod service;

pub use aggregator::{merge_results, Aggregation, Aggregator};
pub use cache::ResultCache;
pub use config::ScraperConfig;
pub use error::{Result, ScrapeError};
pub use listing::{JobListing, Query, SearchResponse, SearchSummary, SourceReport, SourceStatus, SourceTag};
pub use service::ScraperService;
pub use source_scraper::{ListingSource, PremiumSource, SourceScraper};
