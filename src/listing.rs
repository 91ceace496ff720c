//! Listing data model shared by every stage of the pipeline.
//!
//! Every field of [`JobListing`] is always populated: missing values degrade to
//! display sentinels so the JSON shape is stable for consumers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::{collapse_whitespace, encode_query, normalized_prefix, truncate_chars};

pub const UNKNOWN_COMPANY: &str = "N/A";
pub const DEFAULT_SALARY: &str = "Competitive Package";
pub const DEFAULT_EXPERIENCE: &str = "Not specified";
pub const DEFAULT_POSTED: &str = "Recent";

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_COMPANY_CHARS: usize = 50;

/// Prefix lengths for the loose dedup identity.
pub const DEDUP_TITLE_PREFIX: usize = 30;
pub const DEDUP_COMPANY_PREFIX: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Naukri,
    Linkedin,
    Indeed,
    Timesjobs,
    Glassdoor,
    Foundit,
    Synthetic,
    Premium,
}

impl SourceTag {
    pub const PLATFORMS: [SourceTag; 6] = [
        SourceTag::Naukri,
        SourceTag::Linkedin,
        SourceTag::Indeed,
        SourceTag::Timesjobs,
        SourceTag::Glassdoor,
        SourceTag::Foundit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Naukri => "naukri",
            SourceTag::Linkedin => "linkedin",
            SourceTag::Indeed => "indeed",
            SourceTag::Timesjobs => "timesjobs",
            SourceTag::Glassdoor => "glassdoor",
            SourceTag::Foundit => "foundit",
            SourceTag::Synthetic => "synthetic",
            SourceTag::Premium => "premium",
        }
    }

    /// Fabricated entries, never scraped.
    pub fn is_synthetic(&self) -> bool {
        matches!(self, SourceTag::Synthetic | SourceTag::Premium)
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListing {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary: String,
    pub experience: String,
    pub apply_link: String,
    pub source: SourceTag,
    pub synthetic: bool,
    pub scraped_at: DateTime<Utc>,
    pub posted_date: String,
}

impl JobListing {
    /// Loose identity: lowercase title and company prefixes.
    pub fn dedup_key(&self) -> (String, String) {
        (
            normalized_prefix(&self.title, DEDUP_TITLE_PREFIX),
            normalized_prefix(&self.company, DEDUP_COMPANY_PREFIX),
        )
    }
}

/// `source_<random>` identifiers; not stable across runs.
pub fn listing_id(source: SourceTag) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", source.as_str(), &suffix[..12])
}

/// Search-engine query used when neither the listing nor the page gives a link.
pub fn search_engine_link(title: &str, company: &str) -> String {
    format!(
        "https://www.google.com/search?q={}+careers+apply",
        encode_query(&format!("{title} {company}"))
    )
}

/// Fields pulled out of a document before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFields {
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub experience: Option<String>,
    pub link: Option<String>,
    pub posted: Option<String>,
}

/// Turns [`RawFields`] into complete listings for one source and query.
#[derive(Debug, Clone)]
pub struct ListingBuilder<'a> {
    pub source: SourceTag,
    pub default_location: &'a str,
    pub page_url: Option<&'a str>,
}

impl ListingBuilder<'_> {
    pub fn build(&self, raw: RawFields) -> Option<JobListing> {
        let title = truncate_chars(&collapse_whitespace(&raw.title), MAX_TITLE_CHARS);
        if title.is_empty() {
            return None;
        }
        let company = non_empty(raw.company)
            .map(|c| truncate_chars(&c, MAX_COMPANY_CHARS))
            .unwrap_or_else(|| UNKNOWN_COMPANY.to_string());

        let apply_link = non_empty(raw.link)
            .or_else(|| self.page_url.map(str::to_string))
            .unwrap_or_else(|| search_engine_link(&title, &company));

        Some(JobListing {
            id: listing_id(self.source),
            location: non_empty(raw.location).unwrap_or_else(|| self.default_location.to_string()),
            salary: non_empty(raw.salary).unwrap_or_else(|| DEFAULT_SALARY.to_string()),
            experience: non_empty(raw.experience).unwrap_or_else(|| DEFAULT_EXPERIENCE.to_string()),
            posted_date: non_empty(raw.posted).unwrap_or_else(|| DEFAULT_POSTED.to_string()),
            apply_link,
            source: self.source,
            synthetic: self.source.is_synthetic(),
            scraped_at: Utc::now(),
            title,
            company,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| collapse_whitespace(&v))
        .filter(|v| !v.is_empty())
}

/// Immutable search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub keyword: String,
    pub location: String,
    pub max_results: usize,
}

impl Query {
    pub const DEFAULT_LOCATION: &'static str = "India";
    pub const DEFAULT_MAX_RESULTS: usize = 30;

    pub fn new(keyword: impl Into<String>, location: impl Into<String>, max_results: usize) -> Self {
        Self {
            keyword: collapse_whitespace(&keyword.into()),
            location: collapse_whitespace(&location.into()),
            max_results,
        }
    }

    /// Same search with a different result bound.
    pub fn with_max_results(&self, max_results: usize) -> Self {
        Self {
            max_results,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Finished with at least one listing of its own.
    Ok,
    /// Finished with nothing, or with synthetic top-up only.
    Empty,
    /// Returned an error or panicked.
    Failed,
    /// Still running when the aggregation deadline passed.
    TimedOut,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Ok => "ok",
            SourceStatus::Empty => "empty",
            SourceStatus::Failed => "failed",
            SourceStatus::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub source: SourceTag,
    pub status: SourceStatus,
    pub real: usize,
    pub synthetic: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSummary {
    pub total_jobs: usize,
    pub platform_breakdown: BTreeMap<SourceTag, usize>,
    pub synthetic_jobs: usize,
    pub platforms_successful: usize,
    pub platforms_failed: usize,
    pub platforms: Vec<SourceReport>,
    pub cached: bool,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub keyword: String,
    pub location: String,
    pub jobs: Vec<JobListing>,
    pub summary: SearchSummary,
}
