//! Article URL discovery on the fact-check listing page.
//!
//! Pagination runs as a small state machine:
//!
//! 1. Load the listing, let it settle, collect the rendered article links.
//! 2. While short of `limit` and under the attempt ceiling: stop if the
//!    "load more" control is gone or hidden, otherwise click it, settle,
//!    re-scan, and stop if the click produced nothing new.
//! 3. Truncate to `limit`.
//!
//! An empty or failed discovery falls back to the configured URL list.

use crate::browser::{BrowserDriver, BrowserLauncher, with_browser};
use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::fetcher::HttpFetcher;
use itertools::Itertools;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Extract absolute article links from `html`, in document order, without
/// duplicates. Fragments are dropped before comparison.
pub fn collect_article_links(html: &str, base: &Url, pattern: &Regex) -> Vec<String> {
    let document = Html::parse_document(html);
    let anchor = Selector::parse("a[href]").expect("valid selector");

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for a in document.select(&anchor) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let Ok(mut resolved) = base.join(href.trim()) else {
            continue;
        };
        resolved.set_fragment(None);
        let resolved = resolved.to_string();
        if pattern.is_match(&resolved) && seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }
    links
}

/// Accumulates distinct URLs in discovery order.
#[derive(Debug, Default)]
struct Accumulator {
    seen: HashSet<String>,
    urls: Vec<String>,
}

impl Accumulator {
    /// Returns how many URLs were new.
    fn absorb(&mut self, links: Vec<String>) -> usize {
        let before = self.urls.len();
        for link in links {
            if self.seen.insert(link.clone()) {
                self.urls.push(link);
            }
        }
        self.urls.len() - before
    }
}

/// Finds fact-check article URLs.
#[derive(Debug, Clone)]
pub struct UrlDiscovery {
    listing_url: String,
    pattern: Regex,
    load_more_selector: String,
    fallback_urls: Vec<String>,
    max_attempts: u32,
    initial_settle: Duration,
    settle: Duration,
}

impl UrlDiscovery {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        Ok(Self {
            listing_url: config.listing_url.clone(),
            pattern: config.article_pattern()?,
            load_more_selector: config.load_more_selector.clone(),
            fallback_urls: config.fallback_urls.clone(),
            max_attempts: config.discovery.max_pagination_attempts,
            initial_settle: config.discovery.initial_settle(),
            settle: config.discovery.settle(),
        })
    }

    pub fn listing_url(&self) -> &str {
        &self.listing_url
    }

    /// Discover up to `limit` URLs in a fresh browser session. Never fails;
    /// any problem yields the fallback list.
    #[instrument(level = "info", skip_all, fields(limit = limit, listing = %self.listing_url))]
    pub async fn discover<L: BrowserLauncher>(
        &self,
        launcher: &L,
        identity: &str,
        limit: usize,
    ) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }

        let found = with_browser(launcher, identity, async |driver: &mut L::Driver| {
            self.paginate(driver, limit).await
        })
        .await;

        match found {
            Ok(urls) if !urls.is_empty() => {
                info!(count = urls.len(), "Discovered article URLs");
                urls
            }
            Ok(_) => {
                warn!("Listing produced no article links");
                self.fallback(limit)
            }
            Err(e) => {
                warn!(error = %e, "Discovery failed");
                self.fallback(limit)
            }
        }
    }

    /// Run the pagination state machine on an open driver.
    pub async fn paginate<D: BrowserDriver>(
        &self,
        driver: &mut D,
        limit: usize,
    ) -> Result<Vec<String>, ScrapeError> {
        let base = Url::parse(&self.listing_url).map_err(|e| ScrapeError::InvalidUrl {
            url: self.listing_url.clone(),
            reason: e.to_string(),
        })?;

        driver.goto(&self.listing_url).await?;
        sleep(self.initial_settle).await;

        let mut acc = Accumulator::default();
        let html = driver.html().await?;
        let initial = acc.absorb(collect_article_links(&html, &base, &self.pattern));
        debug!(initial, "Initial listing scan");

        let mut attempts = 0u32;
        while acc.urls.len() < limit && attempts < self.max_attempts {
            match driver.is_visible(&self.load_more_selector).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(attempts, "Load-more control absent; end of listing");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Could not inspect load-more control");
                    break;
                }
            }

            if let Err(e) = driver.click(&self.load_more_selector).await {
                warn!(error = %e, attempts, "Load-more click failed");
                break;
            }
            sleep(self.settle).await;

            let html = match driver.html().await {
                Ok(html) => html,
                Err(e) => {
                    warn!(error = %e, "Could not read listing after click");
                    break;
                }
            };
            let added = acc.absorb(collect_article_links(&html, &base, &self.pattern));
            if added == 0 {
                debug!(attempts, "Click produced no new links; stopping");
                break;
            }

            attempts += 1;
            debug!(attempts, added, total = acc.urls.len(), "Loaded more articles");
        }

        let mut urls = acc.urls;
        urls.truncate(limit);
        Ok(urls)
    }

    /// Discover from the first listing page over plain HTTP, without
    /// pagination.
    #[instrument(level = "info", skip_all, fields(limit = limit, listing = %self.listing_url))]
    pub async fn discover_static(&self, http: &HttpFetcher, limit: usize) -> Vec<String> {
        if limit == 0 {
            return Vec::new();
        }

        let page = match http.get(&self.listing_url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "Listing fetch failed");
                return self.fallback(limit);
            }
        };
        let base = Url::parse(&page.final_url)
            .or_else(|_| Url::parse(&self.listing_url))
            .ok();
        let Some(base) = base else {
            return self.fallback(limit);
        };

        let mut urls = collect_article_links(&page.body, &base, &self.pattern);
        urls.truncate(limit);
        if urls.is_empty() {
            warn!("Listing produced no article links");
            return self.fallback(limit);
        }
        info!(count = urls.len(), "Discovered article URLs");
        urls
    }

    /// The configured fallback URLs, deduplicated and capped at `limit`.
    pub fn fallback(&self, limit: usize) -> Vec<String> {
        let urls: Vec<String> = self
            .fallback_urls
            .iter()
            .unique()
            .take(limit)
            .cloned()
            .collect();
        warn!(count = urls.len(), "Degraded mode: using fallback article URLs");
        urls
    }
}
