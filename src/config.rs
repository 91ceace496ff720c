use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::fetcher::{ResponseRules, RetryPolicy};

/// Runtime knobs, read from `JOBS_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ScraperConfig {
    pub workers: usize,
    pub deadline: Duration,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    pub min_body_len: usize,
    pub cache_ttl: Duration,
    pub max_results_limit: usize,
    pub synthetic: bool,
    pub premium: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            workers: 6,
            deadline: Duration::from_secs(25),
            request_timeout: Duration::from_secs(10),
            max_attempts: 2,
            backoff_min: Duration::from_millis(1000),
            backoff_max: Duration::from_millis(3000),
            min_body_len: 1000,
            cache_ttl: Duration::from_secs(300),
            max_results_limit: 50,
            synthetic: true,
            premium: false,
        }
    }
}

impl ScraperConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let secs = |key, default: Duration| Duration::from_secs(parsed(&lookup, key, default.as_secs()));
        let millis = |key, default: Duration| Duration::from_millis(parsed(&lookup, key, default.as_millis() as u64));

        Self {
            workers: parsed(&lookup, "JOBS_WORKERS", d.workers).max(1),
            deadline: secs("JOBS_DEADLINE_SECS", d.deadline),
            request_timeout: secs("JOBS_REQUEST_TIMEOUT_SECS", d.request_timeout),
            max_attempts: parsed(&lookup, "JOBS_MAX_ATTEMPTS", d.max_attempts).max(1),
            backoff_min: millis("JOBS_BACKOFF_MIN_MS", d.backoff_min),
            backoff_max: millis("JOBS_BACKOFF_MAX_MS", d.backoff_max),
            min_body_len: parsed(&lookup, "JOBS_MIN_BODY_LEN", d.min_body_len),
            cache_ttl: secs("JOBS_CACHE_TTL_SECS", d.cache_ttl),
            max_results_limit: parsed(&lookup, "JOBS_MAX_RESULTS_LIMIT", d.max_results_limit).max(1),
            synthetic: flag(&lookup, "JOBS_SYNTHETIC", d.synthetic),
            premium: flag(&lookup, "JOBS_PREMIUM", d.premium),
        }
        .normalized()
    }

    /// Request timeout strictly below the deadline, backoff range ordered.
    pub fn normalized(mut self) -> Self {
        if self.request_timeout >= self.deadline {
            let clamped = self.deadline * 4 / 5;
            warn!(
                request_timeout_ms = self.request_timeout.as_millis() as u64,
                clamped_ms = clamped.as_millis() as u64,
                "Request timeout must be shorter than the aggregation deadline"
            );
            self.request_timeout = clamped;
        }
        if self.backoff_min > self.backoff_max {
            std::mem::swap(&mut self.backoff_min, &mut self.backoff_max);
        }
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_min: self.backoff_min,
            backoff_max: self.backoff_max,
            ..RetryPolicy::default()
        }
    }

    pub fn response_rules(&self) -> ResponseRules {
        ResponseRules {
            min_body_len: self.min_body_len,
            ..ResponseRules::default()
        }
    }

    /// Caller bound capped at the configured limit.
    pub fn clamp_max_results(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_results_limit)
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Invalid value, using default");
            default
        }),
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => default,
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        Some(v) => {
            warn!(key, value = %v, "Invalid flag, using default");
            default
        }
    }
}
