//! Source fetching: one-shot transports behind a trait, wrapped in a retrying
//! [`SourceFetcher`] that only hands back documents worth parsing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{Result, ScrapeError};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

const ACCEPT_LANGUAGES: &[&str] = &["en-US,en;q=0.9", "en-GB,en;q=0.9", "en-US,en;q=0.8"];

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Lowercase substrings that mark a captcha wall or block page.
pub const BLOCK_MARKERS: &[&str] = &[
    "access denied",
    "captcha",
    "blocked",
    "unusual traffic",
    "bot detection",
    "security check",
    "please verify",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeaders {
    pub user_agent: String,
    pub accept_language: String,
    pub referer: Option<String>,
}

/// Picks a fresh header set for every attempt.
#[derive(Debug, Clone)]
pub struct HeaderRotation {
    user_agents: Vec<String>,
    accept_languages: Vec<String>,
}

impl Default for HeaderRotation {
    fn default() -> Self {
        Self {
            user_agents: USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            accept_languages: ACCEPT_LANGUAGES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl HeaderRotation {
    pub fn pick<R: Rng + ?Sized>(&self, referer: Option<&str>, rng: &mut R) -> RequestHeaders {
        RequestHeaders {
            user_agent: self
                .user_agents
                .choose(rng)
                .cloned()
                .unwrap_or_else(|| USER_AGENTS[0].to_string()),
            accept_language: self
                .accept_languages
                .choose(rng)
                .cloned()
                .unwrap_or_else(|| ACCEPT_LANGUAGES[0].to_string()),
            referer: referer.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// A single request attempt. Retries live in [`SourceFetcher`], so a
/// heavier implementation (e.g. a headless browser) only has to provide this.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, headers: &RequestHeaders) -> Result<HttpResponse>;
    fn name(&self) -> &str;
}

/// Plain HTTP transport.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &RequestHeaders) -> Result<HttpResponse> {
        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &headers.user_agent)
            .header(reqwest::header::ACCEPT, ACCEPT_HTML)
            .header(reqwest::header::ACCEPT_LANGUAGE, &headers.accept_language)
            .header(reqwest::header::CACHE_CONTROL, "no-cache");
        if let Some(referer) = &headers.referer {
            request = request.header(reqwest::header::REFERER, referer);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }

    fn name(&self) -> &str {
        "reqwest"
    }
}

/// Bounded retry with randomized, linearly growing backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    /// Added to the backoff after a 429.
    pub rate_limit_penalty: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff_min: Duration::from_millis(1000),
            backoff_max: Duration::from_millis(3000),
            rate_limit_penalty: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_min: Duration::ZERO,
            backoff_max: Duration::ZERO,
            rate_limit_penalty: Duration::ZERO,
        }
    }

    /// Delay before retrying after the zero-based `attempt` failed.
    pub fn backoff<R: Rng + ?Sized>(&self, attempt: u32, cause: &ScrapeError, rng: &mut R) -> Duration {
        let base = if self.backoff_max > self.backoff_min {
            let min = self.backoff_min.as_millis() as u64;
            let max = self.backoff_max.as_millis() as u64;
            Duration::from_millis(rng.random_range(min..=max))
        } else {
            self.backoff_min
        };
        let delay = base * (attempt + 1);
        match cause {
            ScrapeError::RateLimited { .. } => delay + self.rate_limit_penalty,
            _ => delay,
        }
    }
}

/// Which responses count as a usable document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRules {
    pub min_body_len: usize,
    pub block_markers: Vec<String>,
}

impl Default for ResponseRules {
    fn default() -> Self {
        Self {
            min_body_len: 1000,
            block_markers: BLOCK_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ResponseRules {
    pub fn check(&self, url: &str, response: &HttpResponse) -> Result<()> {
        match response.status {
            200..=299 => {}
            429 => return Err(ScrapeError::RateLimited { url: url.to_string() }),
            status => {
                return Err(ScrapeError::HttpStatus {
                    status,
                    url: url.to_string(),
                })
            }
        }

        let len = response.body.chars().count();
        if len <= self.min_body_len {
            return Err(ScrapeError::BodyTooShort {
                url: url.to_string(),
                len,
                min: self.min_body_len,
            });
        }

        let lowered = response.body.to_lowercase();
        if let Some(marker) = self.block_markers.iter().find(|m| lowered.contains(m.as_str())) {
            return Err(ScrapeError::Blocked {
                url: url.to_string(),
                marker: marker.clone(),
            });
        }
        Ok(())
    }
}

/// A response that passed [`ResponseRules`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub url: String,
    pub html: String,
}

pub struct SourceFetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    rules: ResponseRules,
    headers: HeaderRotation,
}

impl SourceFetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy, rules: ResponseRules) -> Self {
        Self {
            transport,
            policy,
            rules,
            headers: HeaderRotation::default(),
        }
    }

    /// Fetch one URL, retrying soft failures. The error only says there is
    /// no usable document; callers fall back rather than propagate it.
    pub async fn fetch(&self, url: &str, referer: Option<&str>) -> Result<RawDocument> {
        let attempts = self.policy.max_attempts.max(1);
        let mut made = 0;
        let mut last = None;

        for attempt in 0..attempts {
            made += 1;
            let headers = self.headers.pick(referer, &mut rand::rng());
            debug!(url, attempt = attempt + 1, transport = self.transport.name(), "Fetching");

            let outcome = match self.transport.get(url, &headers).await {
                Ok(response) => self.rules.check(url, &response).map(|_| response.body),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(html) => {
                    return Ok(RawDocument {
                        url: url.to_string(),
                        html,
                    })
                }
                Err(e) => {
                    warn!(url, attempt = attempt + 1, error = %e, "Rejected response");
                    let retry = e.is_retryable() && attempt + 1 < attempts;
                    let delay = retry.then(|| self.policy.backoff(attempt, &e, &mut rand::rng()));
                    last = Some(e);
                    match delay {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => break,
                    }
                }
            }
        }

        Err(ScrapeError::Exhausted {
            url: url.to_string(),
            attempts: made,
            last: Box::new(
                last.unwrap_or_else(|| ScrapeError::Transport("no attempt made".to_string())),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        responses: Mutex<VecDeque<Result<HttpResponse>>>,
        seen: Mutex<Vec<RequestHeaders>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<HttpResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn get(&self, _url: &str, headers: &RequestHeaders) -> Result<HttpResponse> {
            self.seen.lock().unwrap().push(headers.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ScrapeError::Transport("script exhausted".into())))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn page(body_len: usize) -> HttpResponse {
        HttpResponse {
            status: 200,
            body: format!("<html><body>{}</body></html>", "x".repeat(body_len)),
        }
    }

    #[test]
    fn rules_reject_short_blocked_and_failed_responses() {
        let rules = ResponseRules::default();
        assert!(rules.check("u", &page(2000)).is_ok());
        assert!(matches!(
            rules.check("u", &page(10)),
            Err(ScrapeError::BodyTooShort { .. })
        ));

        let mut blocked = page(2000);
        blocked.body.push_str("Please complete the CAPTCHA");
        assert!(matches!(
            rules.check("u", &blocked),
            Err(ScrapeError::Blocked { marker, .. }) if marker == "captcha"
        ));

        let mut limited = page(2000);
        limited.status = 429;
        assert!(matches!(rules.check("u", &limited), Err(ScrapeError::RateLimited { .. })));

        let mut missing = page(2000);
        missing.status = 404;
        assert!(matches!(
            rules.check("u", &missing),
            Err(ScrapeError::HttpStatus { status: 404, .. })
        ));
    }

    #[test]
    fn backoff_grows_with_attempts_and_rate_limits() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_min: Duration::from_secs(2),
            backoff_max: Duration::from_secs(2),
            rate_limit_penalty: Duration::from_secs(5),
        };
        let mut rng = rand::rng();
        let transport = ScrapeError::Transport("reset".into());
        let limited = ScrapeError::RateLimited { url: "u".into() };
        assert_eq!(policy.backoff(0, &transport, &mut rng), Duration::from_secs(2));
        assert_eq!(policy.backoff(1, &transport, &mut rng), Duration::from_secs(4));
        assert_eq!(policy.backoff(0, &limited, &mut rng), Duration::from_secs(7));
    }

    #[test]
    fn randomized_backoff_stays_in_range() {
        let policy = RetryPolicy::default();
        let cause = ScrapeError::Transport("reset".into());
        let mut rng = rand::rng();
        for _ in 0..50 {
            let delay = policy.backoff(0, &cause, &mut rng);
            assert!(delay >= policy.backoff_min && delay <= policy.backoff_max);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_a_usable_document() {
        let transport = Scripted::new(vec![
            Err(ScrapeError::Transport("connection reset".into())),
            Ok(page(2000)),
        ]);
        let fetcher = SourceFetcher::new(
            transport.clone(),
            RetryPolicy {
                max_attempts: 3,
                backoff_min: Duration::from_secs(1),
                backoff_max: Duration::from_secs(1),
                rate_limit_penalty: Duration::ZERO,
            },
            ResponseRules::default(),
        );

        let started = tokio::time::Instant::now();
        let doc = fetcher
            .fetch("https://example.com/jobs", Some("https://example.com/"))
            .await
            .unwrap();

        assert_eq!(doc.url, "https://example.com/jobs");
        assert_eq!(transport.calls(), 2);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(1) && waited < Duration::from_secs(2));
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].referer.as_deref(), Some("https://example.com/"));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_attempts_yields_failure() {
        let transport = Scripted::new(vec![Ok(page(5)), Ok(page(5)), Ok(page(5))]);
        let fetcher = SourceFetcher::new(
            transport.clone(),
            RetryPolicy::immediate(2),
            ResponseRules::default(),
        );

        let err = fetcher.fetch("https://example.com/jobs", None).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Exhausted { attempts: 2, .. }));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let transport = Scripted::new(vec![
            Ok(HttpResponse {
                status: 404,
                body: String::new(),
            }),
            Ok(page(2000)),
        ]);
        let fetcher = SourceFetcher::new(
            transport.clone(),
            RetryPolicy::immediate(3),
            ResponseRules::default(),
        );

        let err = fetcher.fetch("https://example.com/gone", None).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Exhausted { attempts: 1, .. }));
        assert_eq!(transport.calls(), 1);
    }
}
