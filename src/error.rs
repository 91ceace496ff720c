use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Rate limited (429) for {url}")]
    RateLimited { url: String },

    #[error("Blocked response from {url}: found marker \"{marker}\"")]
    Blocked { url: String, marker: String },

    #[error("Response from {url} too short ({len} chars, need more than {min})")]
    BodyTooShort { url: String, len: usize, min: usize },

    #[error("Invalid selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("All {attempts} attempts failed for {url}: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<ScrapeError>,
    },

    #[error("Source {source_tag} failed: {message}")]
    SourceFailed { source_tag: String, message: String },
}

impl ScrapeError {
    /// Whether another attempt against the same URL could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScrapeError::Transport(_)
            | ScrapeError::RateLimited { .. }
            | ScrapeError::Blocked { .. }
            | ScrapeError::BodyTooShort { .. } => true,
            ScrapeError::HttpStatus { status, .. } => !matches!(status, 404 | 410),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ScrapeError::Transport(format!("timed out: {err}"))
        } else {
            ScrapeError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_failures_are_retryable() {
        assert!(ScrapeError::Transport("connection reset".into()).is_retryable());
        assert!(ScrapeError::RateLimited { url: "u".into() }.is_retryable());
        assert!(ScrapeError::HttpStatus { status: 503, url: "u".into() }.is_retryable());
        assert!(!ScrapeError::HttpStatus { status: 404, url: "u".into() }.is_retryable());
        assert!(!ScrapeError::InvalidSelector { selector: "div[".into(), reason: "r".into() }.is_retryable());
    }

    #[test]
    fn exhausted_reports_last_cause() {
        let err = ScrapeError::Exhausted {
            url: "https://example.com".into(),
            attempts: 2,
            last: Box::new(ScrapeError::Blocked {
                url: "https://example.com".into(),
                marker: "captcha".into(),
            }),
        };
        let message = err.to_string();
        assert!(message.contains("All 2 attempts"));
        assert!(message.contains("captcha"));
    }
}
