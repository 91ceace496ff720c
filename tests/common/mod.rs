#![allow(dead_code)]

use std::future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use job_aggregator::fetcher::{HttpResponse, RequestHeaders, Transport};
use job_aggregator::listing::{ListingBuilder, RawFields};
use job_aggregator::{JobListing, ListingSource, Query, Result, ScrapeError, SourceTag};

pub const NAUKRI_FIXTURE: &str = include_str!("../fixtures/naukri_three_jobs.html");

/// Serves a fixed body for URLs containing a host; everything else fails to connect.
pub struct FixtureTransport {
    routes: Vec<(String, String)>,
    pub calls: AtomicUsize,
}

impl FixtureTransport {
    pub fn new(routes: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            routes: routes.iter().map(|(h, b)| (h.to_string(), b.to_string())).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Self::new(&[])
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn get(&self, url: &str, _headers: &RequestHeaders) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.routes.iter().find(|(host, _)| url.contains(host.as_str())) {
            Some((_, body)) => Ok(HttpResponse {
                status: 200,
                body: body.clone(),
            }),
            None => Err(ScrapeError::Transport(format!("connection refused: {url}"))),
        }
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

pub fn listing(source: SourceTag, title: &str, company: &str, minute: u32) -> JobListing {
    let mut listing = ListingBuilder {
        source,
        default_location: "India",
        page_url: None,
    }
    .build(RawFields {
        title: title.to_string(),
        company: Some(company.to_string()),
        ..Default::default()
    })
    .expect("non-empty title");
    listing.scraped_at = Utc
        .with_ymd_and_hms(2024, 5, 1, 10, minute, 0)
        .single()
        .expect("valid timestamp");
    listing
}

/// Returns the same listings after `delay`.
pub struct FixedSource {
    pub tag: SourceTag,
    pub listings: Vec<JobListing>,
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl FixedSource {
    pub fn new(tag: SourceTag, listings: Vec<JobListing>) -> Self {
        Self {
            tag,
            listings,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ListingSource for FixedSource {
    fn tag(&self) -> SourceTag {
        self.tag
    }

    async fn scrape(&self, _query: &Query) -> Result<Vec<JobListing>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.listings.clone())
    }
}

pub struct FailingSource(pub SourceTag);

#[async_trait]
impl ListingSource for FailingSource {
    fn tag(&self) -> SourceTag {
        self.0
    }

    async fn scrape(&self, _query: &Query) -> Result<Vec<JobListing>> {
        Err(ScrapeError::SourceFailed {
            source_tag: self.0.to_string(),
            message: "selector table out of date".to_string(),
        })
    }
}

pub struct PanickingSource(pub SourceTag);

#[async_trait]
impl ListingSource for PanickingSource {
    fn tag(&self) -> SourceTag {
        self.0
    }

    async fn scrape(&self, _query: &Query) -> Result<Vec<JobListing>> {
        panic!("layout changed under us");
    }
}

/// Never completes.
pub struct StalledSource(pub SourceTag);

#[async_trait]
impl ListingSource for StalledSource {
    fn tag(&self) -> SourceTag {
        self.0
    }

    async fn scrape(&self, _query: &Query) -> Result<Vec<JobListing>> {
        future::pending().await
    }
}
