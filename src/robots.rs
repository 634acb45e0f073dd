//! robots.txt compliance with a per-domain cache.
//!
//! The gate fails open: an unreachable or non-200 robots.txt means the whole
//! domain is treated as allowed. Availability wins over strict compliance.

use crate::config::RobotsConfig;
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Cached robots.txt state for one scheme+host.
#[derive(Debug, Clone)]
pub struct RobotsDecision {
    pub base_url: String,
    /// `None` means allow everything.
    pub ruleset: Option<String>,
    pub fetched_at: Instant,
}

impl RobotsDecision {
    pub fn allows_all(&self) -> bool {
        self.ruleset.is_none()
    }
}

/// Answers whether a URL may be fetched by a given user agent.
#[derive(Debug)]
pub struct PolitenessGate {
    client: reqwest::Client,
    cache: HashMap<String, RobotsDecision>,
    ttl: Duration,
    timeout: Duration,
    default_agent: String,
}

impl PolitenessGate {
    pub fn new(config: &RobotsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache: HashMap::new(),
            ttl: Duration::from_secs(config.ttl_secs),
            timeout: Duration::from_secs(config.timeout_secs),
            default_agent: config.default_agent.clone(),
        }
    }

    /// Check `url` for `user_agent` (or the configured default agent).
    /// Never fails; unparseable URLs are allowed.
    #[instrument(level = "debug", skip(self))]
    pub async fn can_fetch(&mut self, url: &str, user_agent: Option<&str>) -> bool {
        let Some(base_url) = base_url(url) else {
            warn!(%url, "Cannot derive robots.txt location; allowing");
            return true;
        };

        let stale = match self.cache.get(&base_url) {
            Some(decision) => decision.fetched_at.elapsed() > self.ttl,
            None => true,
        };
        if stale {
            let decision = self.fetch_decision(&base_url).await;
            self.cache.insert(base_url.clone(), decision);
        }

        let Some(decision) = self.cache.get(&base_url) else {
            return true;
        };
        let Some(ruleset) = decision.ruleset.as_deref() else {
            return true;
        };

        let agent = user_agent.unwrap_or(self.default_agent.as_str());
        let mut matcher = DefaultMatcher::default();
        let allowed = matcher.one_agent_allowed_by_robots(ruleset, agent, url);
        debug!(%url, agent, allowed, "robots.txt verdict");
        allowed
    }

    /// The cached decision for a domain, if any.
    pub fn cached(&self, base_url: &str) -> Option<&RobotsDecision> {
        self.cache.get(base_url)
    }

    async fn fetch_decision(&self, base_url: &str) -> RobotsDecision {
        let robots_url = format!("{base_url}/robots.txt");
        info!(%robots_url, "Downloading robots.txt");

        let ruleset = match self.client.get(&robots_url).timeout(self.timeout).send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => match resp.text().await {
                Ok(body) => Some(body),
                Err(e) => {
                    warn!(%robots_url, error = %e, "Could not read robots.txt body; assuming access allowed");
                    None
                }
            },
            Ok(resp) => {
                warn!(%robots_url, status = resp.status().as_u16(), "robots.txt unavailable; assuming access allowed");
                None
            }
            Err(e) => {
                warn!(%robots_url, error = %e, "Error downloading robots.txt; assuming access allowed");
                None
            }
        };

        RobotsDecision {
            base_url: base_url.to_string(),
            ruleset,
            fetched_at: Instant::now(),
        }
    }
}

/// `scheme://host[:port]` of a URL.
pub fn base_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn gate(ttl_secs: u64, timeout_secs: u64) -> PolitenessGate {
        PolitenessGate::new(&RobotsConfig {
            ttl_secs,
            timeout_secs,
            default_agent: "*".to_string(),
        })
    }

    #[test]
    fn test_base_url() {
        assert_eq!(
            base_url("https://www.newtral.es/zona-verificacion/fact-check/?page=2").as_deref(),
            Some("https://www.newtral.es")
        );
        assert_eq!(base_url("http://127.0.0.1:8080/a").as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(base_url("not a url"), None);
    }

    #[tokio::test]
    async fn test_rules_are_applied() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/robots.txt");
                then.status(200)
                    .body("User-agent: *\nDisallow: /private/\n\nUser-agent: BadBot\nDisallow: /\n");
            })
            .await;

        let mut gate = gate(3600, 5);
        assert!(gate.can_fetch(&server.url("/public/page"), None).await);
        assert!(!gate.can_fetch(&server.url("/private/page"), None).await);
        assert!(!gate.can_fetch(&server.url("/public/page"), Some("BadBot")).await);
        assert!(
            gate.can_fetch(&server.url("/public/page"), Some("Mozilla/5.0 (X11; Linux x86_64)"))
                .await
        );
    }

    #[tokio::test]
    async fn test_cache_is_reused_within_ttl() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/robots.txt");
                then.status(200).body("User-agent: *\nAllow: /\n");
            })
            .await;

        let mut gate = gate(3600, 5);
        for _ in 0..3 {
            assert!(gate.can_fetch(&server.url("/a"), None).await);
        }
        mock.assert_hits_async(1).await;
        assert!(!gate.cached(&server.base_url()).unwrap().allows_all());
    }

    #[tokio::test]
    async fn test_expired_entry_is_refreshed() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/robots.txt");
                then.status(200).body("User-agent: *\nDisallow:\n");
            })
            .await;

        let mut gate = gate(0, 5);
        gate.can_fetch(&server.url("/a"), None).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        gate.can_fetch(&server.url("/b"), None).await;
        mock.assert_hits_async(2).await;
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/robots.txt");
                then.status(404);
            })
            .await;

        let mut gate = gate(3600, 5);
        assert!(gate.can_fetch(&server.url("/anything"), None).await);
        assert!(gate.cached(&server.base_url()).unwrap().allows_all());
    }

    #[tokio::test]
    async fn test_network_error_allows_all() {
        let mut gate = gate(3600, 2);
        // Nothing listens on port 1.
        assert!(gate.can_fetch("http://127.0.0.1:1/private/page", None).await);
        assert!(gate.cached("http://127.0.0.1:1").unwrap().allows_all());
    }

    #[tokio::test]
    async fn test_timeout_allows_all() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/robots.txt");
                then.status(200)
                    .body("User-agent: *\nDisallow: /\n")
                    .delay(Duration::from_secs(3));
            })
            .await;

        let mut gate = gate(3600, 1);
        assert!(gate.can_fetch(&server.url("/private/page"), None).await);
    }
}
