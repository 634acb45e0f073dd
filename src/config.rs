//! Scraper configuration.
//!
//! Every field has a default tuned for Newtral, so an empty (or missing) YAML
//! file yields a working configuration. Values from the command line are
//! applied on top by the binary.
//!
//! ```yaml
//! respect_robots: true
//! mode: browser
//! discovery:
//!   max_pagination_attempts: 25
//! http:
//!   max_attempts: 3
//!   base_delay_ms: 1000
//! fallback_urls:
//!   - https://www.newtral.es/antiguedad-coches-espana-factcheck/20250320/
//! ```

use crate::error::ScrapeError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// How pages are retrieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeMode {
    /// Headless Chrome, with "load more" pagination.
    #[default]
    Browser,
    /// Plain HTTP, first listing page only.
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub base_url: String,
    pub listing_url: String,
    /// Regex an absolute URL must match to count as a fact-check article.
    pub article_url_pattern: String,
    pub load_more_selector: String,
    /// Title-bearing element awaited before an article is extracted.
    pub landmark_selector: String,
    /// Returned by discovery when nothing could be found.
    pub fallback_urls: Vec<String>,
    pub respect_robots: bool,
    pub mode: ScrapeMode,
    /// Optional newline-delimited list of identity strings.
    pub user_agents_file: Option<PathBuf>,
    pub discovery: DiscoveryConfig,
    pub browser: BrowserConfig,
    pub http: HttpConfig,
    pub robots: RobotsConfig,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.newtral.es".to_string(),
            listing_url: "https://www.newtral.es/zona-verificacion/fact-check/".to_string(),
            article_url_pattern: r"^https?://(?:www\.)?newtral\.es/[a-z0-9-]+/\d{8}/?$".to_string(),
            load_more_selector: "button.c-pagination__load-more, .load-more button, button.load-more, a.load-more"
                .to_string(),
            landmark_selector: "h1".to_string(),
            fallback_urls: vec![
                "https://www.newtral.es/antiguedad-coches-espana-factcheck/20250320/".to_string(),
            ],
            respect_robots: true,
            mode: ScrapeMode::default(),
            user_agents_file: None,
            discovery: DiscoveryConfig::default(),
            browser: BrowserConfig::default(),
            http: HttpConfig::default(),
            robots: RobotsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub max_pagination_attempts: u32,
    /// Wait after the listing page first loads.
    pub initial_settle_ms: u64,
    /// Wait after each "load more" click.
    pub settle_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_pagination_attempts: 20,
            initial_settle_ms: 3000,
            settle_ms: 3000,
        }
    }
}

impl DiscoveryConfig {
    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub chrome_executable: Option<PathBuf>,
    pub landmark_timeout_secs: u64,
    pub navigation_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            chrome_executable: None,
            landmark_timeout_secs: 20,
            navigation_timeout_secs: 30,
        }
    }
}

impl BrowserConfig {
    pub fn landmark_timeout(&self) -> Duration {
        Duration::from_secs(self.landmark_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            timeout_secs: 30,
        }
    }
}

impl HttpConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotsConfig {
    pub ttl_secs: u64,
    pub timeout_secs: u64,
    pub default_agent: String,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            timeout_secs: 10,
            default_agent: "*".to_string(),
        }
    }
}

impl ScraperConfig {
    /// Load a YAML configuration file and validate it.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScrapeError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: ScraperConfig = if raw.trim().is_empty() {
            ScraperConfig::default()
        } else {
            serde_yaml::from_str(&raw)?
        };
        config.validate()?;
        info!(listing_url = %config.listing_url, mode = ?config.mode, "Loaded scraper configuration");
        Ok(config)
    }

    /// Check URLs, compile the article pattern and make sure every fallback
    /// URL matches it.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        for (name, value) in [("base_url", &self.base_url), ("listing_url", &self.listing_url)] {
            Url::parse(value)
                .map_err(|e| ScrapeError::Config(format!("{name} {value:?} is not a valid URL: {e}")))?;
        }
        let pattern = self.article_pattern()?;
        if let Some(bad) = self.fallback_urls.iter().find(|u| !pattern.is_match(u)) {
            return Err(ScrapeError::Config(format!(
                "fallback url {bad:?} does not match article_url_pattern"
            )));
        }
        if self.http.max_attempts == 0 {
            return Err(ScrapeError::Config("http.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The compiled article URL pattern.
    pub fn article_pattern(&self) -> Result<Regex, ScrapeError> {
        Regex::new(&self.article_url_pattern)
            .map_err(|e| ScrapeError::Config(format!("article_url_pattern: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScraperConfig::default();
        config.validate().unwrap();
        let pattern = config.article_pattern().unwrap();
        assert!(pattern.is_match("https://www.newtral.es/antiguedad-coches-espana-factcheck/20250320/"));
        assert!(!pattern.is_match("https://www.newtral.es/zona-verificacion/fact-check/"));
        assert!(!pattern.is_match("https://example.com/slug/20250320/"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "respect_robots: false\nmode: http\ndiscovery:\n  max_pagination_attempts: 5\n"
        )
        .unwrap();

        let config = ScraperConfig::load(file.path()).unwrap();
        assert!(!config.respect_robots);
        assert_eq!(config.mode, ScrapeMode::Http);
        assert_eq!(config.discovery.max_pagination_attempts, 5);
        assert_eq!(config.discovery.settle_ms, 3000);
        assert_eq!(config.http.max_attempts, 3);
        assert_eq!(config.robots.ttl_secs, 3600);
    }

    #[test]
    fn test_empty_file_is_default() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = ScraperConfig::load(file.path()).unwrap();
        assert_eq!(config.listing_url, ScraperConfig::default().listing_url);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = ScraperConfig {
            article_url_pattern: "([".to_string(),
            ..ScraperConfig::default()
        };
        assert!(matches!(config.validate(), Err(ScrapeError::Config(_))));
    }

    #[test]
    fn test_fallback_urls_must_match_article_pattern() {
        let config = ScraperConfig {
            fallback_urls: vec![
                "https://www.newtral.es/antiguedad-coches-espana-factcheck/20250320/".to_string(),
                "https://example.com/otro-bulo/20250320/".to_string(),
            ],
            ..ScraperConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("example.com"));

        let config = ScraperConfig {
            fallback_urls: vec!["https://www.newtral.es/zona-verificacion/fact-check/".to_string()],
            ..ScraperConfig::default()
        };
        assert!(matches!(config.validate(), Err(ScrapeError::Config(_))));

        let config = ScraperConfig {
            fallback_urls: Vec::new(),
            ..ScraperConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn test_zero_attempts_is_rejected() {
        let mut config = ScraperConfig::default();
        config.http.max_attempts = 0;
        assert!(config.validate().is_err());
    }
}
