//! Concurrent fan-out over every registered source.
//!
//! Sources run as tasks on a [`JoinSet`], at most `workers` at a time. The
//! whole run is bounded by a deadline: tasks still running when it passes
//! are aborted and reported as timed out. A source that errors or panics is
//! reported as failed and contributes nothing.
//!
//! Results are merged in registration order, not completion order, so the
//! deduplicated set does not depend on which source answered first.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::listing::{JobListing, Query, SourceReport, SourceStatus, SourceTag};
use crate::source_scraper::ListingSource;

pub const DEFAULT_WORKERS: usize = 6;
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(25);

/// Merged listings plus one report per registered source.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub listings: Vec<JobListing>,
    pub reports: Vec<SourceReport>,
}

enum Outcome {
    Done(Vec<JobListing>),
    Failed(String),
    TimedOut,
}

pub struct Aggregator {
    sources: Vec<Arc<dyn ListingSource>>,
    workers: usize,
    deadline: Duration,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn ListingSource>>) -> Self {
        Self {
            sources,
            workers: DEFAULT_WORKERS,
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn aggregate(&self, query: &Query) -> Aggregation {
        let started = Instant::now();
        let deadline = started + self.deadline;
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for (index, source) in self.sources.iter().enumerate() {
            let source = Arc::clone(source);
            let semaphore = Arc::clone(&semaphore);
            let query = query.clone();
            tasks.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = AssertUnwindSafe(source.scrape(&query)).catch_unwind().await;
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<Outcome>> = self.sources.iter().map(|_| None).collect();
        let mut timed_out = false;

        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, result)))) => {
                    let tag = self.sources[index].tag();
                    let outcome = match result {
                        Ok(Ok(listings)) => {
                            debug!(source = %tag, count = listings.len(), "Source finished");
                            Outcome::Done(listings)
                        }
                        Ok(Err(e)) => {
                            warn!(source = %tag, error = %e, "Source failed");
                            Outcome::Failed(e.to_string())
                        }
                        Err(panic) => {
                            let message = panic_message(&*panic);
                            error!(source = %tag, panic = %message, "Source panicked");
                            Outcome::Failed(format!("panicked: {message}"))
                        }
                    };
                    outcomes[index] = Some(outcome);
                }
                Ok(Some(Err(e))) => {
                    error!(error = %e, "Source task could not be joined");
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    tasks.abort_all();
                    break;
                }
            }
        }

        if timed_out {
            let abandoned: Vec<&str> = outcomes
                .iter()
                .zip(&self.sources)
                .filter(|(outcome, _)| outcome.is_none())
                .map(|(_, source)| source.tag().as_str())
                .collect();
            warn!(
                deadline_ms = self.deadline.as_millis() as u64,
                abandoned = ?abandoned,
                "Aggregation deadline passed"
            );
        }

        let mut reports = Vec::with_capacity(self.sources.len());
        let mut per_source = Vec::with_capacity(self.sources.len());
        for (source, outcome) in self.sources.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| {
                if timed_out {
                    Outcome::TimedOut
                } else {
                    Outcome::Failed("task aborted".to_string())
                }
            });
            reports.push(report(source.tag(), &outcome));
            if let Outcome::Done(listings) = outcome {
                per_source.push(listings);
            }
        }

        let listings = merge_results(per_source, query.max_results);
        info!(
            keyword = %query.keyword,
            location = %query.location,
            count = listings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregation complete"
        );

        Aggregation { listings, reports }
    }
}

fn report(source: SourceTag, outcome: &Outcome) -> SourceReport {
    match outcome {
        Outcome::Done(listings) => {
            let synthetic = listings.iter().filter(|l| l.synthetic).count();
            let own = listings.iter().any(|l| l.source == source);
            SourceReport {
                source,
                status: if own { SourceStatus::Ok } else { SourceStatus::Empty },
                real: listings.len() - synthetic,
                synthetic,
                error: None,
            }
        }
        Outcome::Failed(message) => SourceReport {
            source,
            status: SourceStatus::Failed,
            real: 0,
            synthetic: 0,
            error: Some(message.clone()),
        },
        Outcome::TimedOut => SourceReport {
            source,
            status: SourceStatus::TimedOut,
            real: 0,
            synthetic: 0,
            error: Some("deadline exceeded".to_string()),
        },
    }
}

/// Dedup by loose identity keeping the first occurrence, order scraped
/// listings ahead of synthetic ones and each group by `scraped_at`
/// descending (stable), then truncate.
pub fn merge_results(per_source: Vec<Vec<JobListing>>, max_results: usize) -> Vec<JobListing> {
    let mut seen = HashSet::new();
    let mut merged: Vec<JobListing> = per_source
        .into_iter()
        .flatten()
        .filter(|listing| seen.insert(listing.dedup_key()))
        .collect();

    // Scraped before synthetic, then newest first.
    merged.sort_by(|a, b| {
        a.synthetic
            .cmp(&b.synthetic)
            .then_with(|| b.scraped_at.cmp(&a.scraped_at))
    });
    merged.truncate(max_results);
    merged
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{ListingBuilder, RawFields};
    use chrono::{Duration as ChronoDuration, Utc};

    fn listing(title: &str, company: &str, source: SourceTag, age_secs: i64) -> JobListing {
        let mut listing = ListingBuilder {
            source,
            default_location: "India",
            page_url: None,
        }
        .build(RawFields {
            title: title.into(),
            company: Some(company.into()),
            ..Default::default()
        })
        .unwrap();
        listing.scraped_at = Utc::now() - ChronoDuration::seconds(age_secs);
        listing
    }

    #[test]
    fn first_occurrence_wins() {
        let merged = merge_results(
            vec![
                vec![listing("Python Developer", "Infosys", SourceTag::Naukri, 10)],
                vec![listing("python developer", "INFOSYS", SourceTag::Indeed, 0)],
            ],
            10,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, SourceTag::Naukri);
    }

    #[test]
    fn newest_first_with_stable_ties() {
        let now = Utc::now();
        let mut a = listing("Backend Engineer", "Swiggy", SourceTag::Naukri, 0);
        let mut b = listing("Frontend Engineer", "Zomato", SourceTag::Naukri, 0);
        let c = listing("Data Engineer", "Ola", SourceTag::Linkedin, 60);
        a.scraped_at = now;
        b.scraped_at = now;

        let merged = merge_results(vec![vec![c, a], vec![b]], 10);
        let titles: Vec<_> = merged.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["Backend Engineer", "Frontend Engineer", "Data Engineer"]);
    }

    #[test]
    fn truncates_to_max_results() {
        let batch = (0..8)
            .map(|i| listing(&format!("Engineer Level {i}"), "Acme", SourceTag::Glassdoor, i))
            .collect();
        assert_eq!(merge_results(vec![batch], 3).len(), 3);
        assert!(merge_results(Vec::new(), 3).is_empty());
    }

    #[test]
    fn newer_synthetic_listings_never_displace_real_ones() {
        let real = listing("Python Developer", "Infosys Limited", SourceTag::Naukri, 30);
        let padding: Vec<JobListing> = (0..4)
            .map(|i| listing(&format!("Python Developer {i}"), "Acme", SourceTag::Synthetic, 0))
            .collect();

        let merged = merge_results(vec![vec![real], padding], 3);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].source, SourceTag::Naukri);
        assert!(merged[1..].iter().all(|l| l.synthetic));
    }

    #[test]
    fn report_status_follows_own_listings() {
        let topped_up = Outcome::Done(vec![listing("Rust Developer", "Acme", SourceTag::Synthetic, 0)]);
        let report = report(SourceTag::Foundit, &topped_up);
        assert_eq!(report.status, SourceStatus::Empty);
        assert_eq!((report.real, report.synthetic), (0, 1));

        let premium = Outcome::Done(vec![listing("Rust Developer", "Acme", SourceTag::Premium, 0)]);
        assert_eq!(super::report(SourceTag::Premium, &premium).status, SourceStatus::Ok);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(&*payload), "owned boom");
    }
}
