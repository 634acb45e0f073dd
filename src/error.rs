//! Error types shared by the scraping pipeline.
//!
//! Only a handful of operations surface these errors to callers. The pipeline
//! boundaries (robots checks, discovery, the scrape loop) log and degrade
//! instead of propagating.

use thiserror::Error;

/// An HTTP fetch that could not be completed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status} after {attempts} attempt(s)")]
    Status { url: String, status: u16, attempts: u32 },
    #[error("could not read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Crate-wide error.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("browser error: {0}")]
    Browser(String),
    #[error("timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScrapeError {
    pub(crate) fn browser(e: impl std::fmt::Display) -> Self {
        ScrapeError::Browser(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let e = FetchError::Status {
            url: "https://example.com".to_string(),
            status: 503,
            attempts: 3,
        };
        assert_eq!(
            e.to_string(),
            "https://example.com answered with status 503 after 3 attempt(s)"
        );
    }

    #[test]
    fn test_fetch_error_converts_into_scrape_error() {
        let e: ScrapeError = FetchError::Status {
            url: "https://example.com".to_string(),
            status: 404,
            attempts: 1,
        }
        .into();
        assert!(matches!(e, ScrapeError::Fetch(FetchError::Status { status: 404, .. })));
    }

    #[test]
    fn test_timeout_message() {
        let e = ScrapeError::Timeout {
            what: "selector h1".to_string(),
            secs: 20,
        };
        assert_eq!(e.to_string(), "timed out after 20s waiting for selector h1");
    }
}
