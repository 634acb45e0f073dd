//! Newtral fact-check scraper.
//!
//! [`FactCheckScraper::scrape`] runs the whole pipeline one step at a time:
//! rotate the identity, discover article URLs, then load each article in its
//! own browser session (or over HTTP in `http` mode) and extract a record.
//! Articles that fail at any point are logged and skipped; the call itself
//! never fails.

use crate::browser::{BrowserDriver, BrowserLauncher, ChromeLauncher, with_browser};
use crate::config::{ScrapeMode, ScraperConfig};
use crate::error::ScrapeError;
use crate::fetcher::HttpFetcher;
use crate::identity::UserAgentSource;
use crate::models::ArticleRecord;
use crate::robots::PolitenessGate;
use crate::scrapers::discovery::UrlDiscovery;
use crate::scrapers::extract::FieldExtractor;
use crate::utils::truncate_for_log;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// The scraping engine. Generic over the browser so tests can script one.
pub struct FactCheckScraper<L: BrowserLauncher = ChromeLauncher> {
    config: ScraperConfig,
    launcher: L,
    identities: UserAgentSource,
    identity: String,
    gate: PolitenessGate,
    http: HttpFetcher,
    discovery: UrlDiscovery,
    extractor: FieldExtractor,
}

impl FactCheckScraper<ChromeLauncher> {
    /// Engine backed by a local Chrome.
    pub fn from_config(config: ScraperConfig) -> Result<Self, ScrapeError> {
        let launcher = ChromeLauncher::new(&config.browser);
        Self::new(config, launcher)
    }
}

impl<L: BrowserLauncher> FactCheckScraper<L> {
    pub fn new(config: ScraperConfig, launcher: L) -> Result<Self, ScrapeError> {
        config.validate()?;
        let identities = UserAgentSource::from_config(config.user_agents_file.as_deref());
        let identity = identities.desktop_identity();
        let http = HttpFetcher::new(&config.http, identities.clone())?;

        Ok(Self {
            gate: PolitenessGate::new(&config.robots),
            discovery: UrlDiscovery::new(&config)?,
            extractor: FieldExtractor::new(),
            config,
            launcher,
            identities,
            identity,
            http,
        })
    }

    /// Replace the HTTP fetcher, e.g. one with a different backoff.
    pub fn with_http(mut self, http: HttpFetcher) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// The identity used for the current scrape.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Pick a fresh desktop identity.
    pub fn rotate_identity(&mut self) -> &str {
        self.identity = self.identities.desktop_identity();
        debug!(identity = %truncate_for_log(&self.identity, 60), "Rotated identity");
        &self.identity
    }

    /// Scrape up to `limit` fact-checks, in discovery order.
    #[instrument(level = "info", skip(self), fields(mode = ?self.config.mode, respect_robots = self.config.respect_robots))]
    pub async fn scrape(&mut self, limit: usize) -> Vec<ArticleRecord> {
        let started = Instant::now();
        let identity = self.rotate_identity().to_string();

        let urls = self.discover(&identity, limit).await;
        info!(count = urls.len(), "Article URLs to scrape");

        let mut records = Vec::with_capacity(urls.len());
        let mut skipped = 0usize;
        for (idx, url) in urls.iter().enumerate() {
            if !self.allowed(url).await {
                warn!(%url, "Disallowed by robots.txt; skipping");
                skipped += 1;
                continue;
            }

            let outcome = match self.config.mode {
                ScrapeMode::Browser => self.scrape_rendered(url, &identity).await,
                ScrapeMode::Http => self.scrape_fetched(url).await,
            };
            match outcome {
                Ok(Some(record)) => {
                    info!(
                        position = idx + 1,
                        title = %truncate_for_log(&record.title, 80),
                        "Scraped article"
                    );
                    records.push(record);
                }
                Ok(None) => {
                    warn!(%url, "No title found; skipping");
                    skipped += 1;
                }
                Err(e) => {
                    warn!(%url, error = %e, "Article failed; skipping");
                    skipped += 1;
                }
            }
        }

        info!(
            scraped = records.len(),
            skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scrape finished"
        );
        records
    }

    async fn discover(&mut self, identity: &str, limit: usize) -> Vec<String> {
        let listing = self.discovery.listing_url().to_string();
        if !self.allowed(&listing).await {
            warn!(%listing, "Listing disallowed by robots.txt");
            return self.discovery.fallback(limit);
        }
        match self.config.mode {
            ScrapeMode::Browser => self.discovery.discover(&self.launcher, identity, limit).await,
            ScrapeMode::Http => self.discovery.discover_static(&self.http, limit).await,
        }
    }

    async fn allowed(&mut self, url: &str) -> bool {
        if !self.config.respect_robots {
            return true;
        }
        self.gate.can_fetch(url, Some(self.identity.as_str())).await
    }

    /// Load `url` in a fresh session, wait for the landmark, extract.
    async fn scrape_rendered(&self, url: &str, identity: &str) -> Result<Option<ArticleRecord>, ScrapeError> {
        let landmark = self.config.landmark_selector.as_str();
        let wait = self.config.browser.landmark_timeout();

        let html = with_browser(&self.launcher, identity, async |driver: &mut L::Driver| {
            driver.goto(url).await?;
            driver.wait_for(landmark, wait).await?;
            driver.html().await
        })
        .await?;

        Ok(self.extractor.extract_html(&html, url))
    }

    async fn scrape_fetched(&self, url: &str) -> Result<Option<ArticleRecord>, ScrapeError> {
        let page = self.http.get(url).await?;
        Ok(self.extractor.extract_html(&page.body, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{ScriptedLauncher, Site};
    use crate::models::VerificationCategory;
    use httpmock::prelude::*;

    const LISTING: &str = "https://www.newtral.es/zona-verificacion/fact-check/";

    fn url(n: usize) -> String {
        format!("https://www.newtral.es/bulo-{n}-factcheck/2025030{n}/")
    }

    fn article_html(n: usize) -> String {
        format!(
            r#"<html><body><article>
                <h1 class="c-detail__title">Verificación número {n} sobre coches</h1>
                <span class="card-text-marked-red">Falso</span>
                <div class="c-detail__body"><p>Un párrafo con contenido suficiente para la verificación {n}.</p></div>
            </article></body></html>"#
        )
    }

    fn scripted_config() -> ScraperConfig {
        let mut config = ScraperConfig::default();
        config.respect_robots = false;
        config.discovery.initial_settle_ms = 0;
        config.discovery.settle_ms = 0;
        config
    }

    fn listing_html(ns: &[usize]) -> String {
        ns.iter()
            .map(|n| format!(r#"<a href="{}">{n}</a>"#, url(*n)))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_landmark_skips_article() {
        let site = Site::default()
            .page(LISTING, &listing_html(&[1, 2, 3]))
            .page(&url(1), &article_html(1))
            .page(&url(2), "<html><body><p>Cargando...</p></body></html>")
            .page(&url(3), &article_html(3));
        let launcher = ScriptedLauncher::new(site);
        let mut scraper = FactCheckScraper::new(scripted_config(), launcher.clone()).unwrap();

        let records = scraper.scrape(10).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].url, url(1));
        assert_eq!(records[1].url, url(3));
        assert_eq!(records[0].verification_category, Some(VerificationCategory::Falso));
        // One session for discovery plus one per article, all closed.
        assert_eq!(launcher.launches(), 4);
        assert_eq!(launcher.closes(), 4);
    }

    #[tokio::test]
    async fn test_unreachable_fallback_yields_nothing() {
        let fallback = ScraperConfig::default().fallback_urls[0].clone();
        let site = Site::default().unreachable(LISTING).unreachable(&fallback);
        let launcher = ScriptedLauncher::new(site);
        let mut scraper = FactCheckScraper::new(scripted_config(), launcher.clone()).unwrap();

        assert!(scraper.scrape(5).await.is_empty());
        assert_eq!(launcher.closes(), 2);
    }

    #[tokio::test]
    async fn test_identity_rotates_each_scrape() {
        let mut config = scripted_config();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"Desk/1.0\nPhone/1.0 Mobile\n").unwrap();
        config.user_agents_file = Some(file.path().to_path_buf());

        let launcher = ScriptedLauncher::new(Site::default().page(LISTING, &listing_html(&[1])).page(&url(1), &article_html(1)));
        let mut scraper = FactCheckScraper::new(config, launcher.clone()).unwrap();
        scraper.scrape(1).await;

        assert_eq!(scraper.identity(), "Desk/1.0");
        let identities = launcher.log.lock().unwrap().identities.clone();
        assert!(identities.iter().all(|i| i == "Desk/1.0"));
    }

    #[tokio::test]
    async fn test_http_mode_with_robots() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/robots.txt");
                then.status(200).body("User-agent: *\nDisallow: /privado-factcheck/\n");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/fact-check/");
                then.status(200).body(
                    r#"<a href="/uno-factcheck/20250301/">1</a>
                       <a href="/privado-factcheck/20250302/">2</a>
                       <a href="/roto-factcheck/20250303/">3</a>
                       <a href="/cuatro-factcheck/20250304/">4</a>"#,
                );
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/uno-factcheck/20250301/");
                then.status(200).body(article_html(1));
            })
            .await;
        let private = server
            .mock_async(|when, then| {
                when.method(GET).path("/privado-factcheck/20250302/");
                then.status(200).body(article_html(2));
            })
            .await;
        let broken = server
            .mock_async(|when, then| {
                when.method(GET).path("/roto-factcheck/20250303/");
                then.status(500);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cuatro-factcheck/20250304/");
                then.status(200).body(article_html(4));
            })
            .await;

        let mut config = ScraperConfig::default();
        config.mode = ScrapeMode::Http;
        config.base_url = server.base_url();
        config.listing_url = server.url("/fact-check/");
        config.article_url_pattern = r"^http://127\.0\.0\.1:\d+/[a-z0-9-]+/\d{8}/?$".to_string();
        config.fallback_urls = Vec::new();
        config.http.base_delay_ms = 0;

        let launcher = ScriptedLauncher::new(Site::default());
        let mut scraper = FactCheckScraper::new(config, launcher.clone()).unwrap();
        let records = scraper.scrape(10).await;

        let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                server.url("/uno-factcheck/20250301/"),
                server.url("/cuatro-factcheck/20250304/"),
            ]
        );
        assert_eq!(records[1].publish_date, chrono::NaiveDate::from_ymd_opt(2025, 3, 4));
        private.assert_hits_async(0).await;
        broken.assert_hits_async(3).await;
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_disallowed_listing_goes_to_fallback() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/robots.txt");
                then.status(200).body("User-agent: *\nDisallow: /fact-check/\n");
            })
            .await;
        let listing = server
            .mock_async(|when, then| {
                when.method(GET).path("/fact-check/");
                then.status(200).body("");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/conocido-factcheck/20250101/");
                then.status(200).body(article_html(7));
            })
            .await;

        let mut config = ScraperConfig::default();
        config.mode = ScrapeMode::Http;
        config.base_url = server.base_url();
        config.listing_url = server.url("/fact-check/");
        config.article_url_pattern = r"^http://127\.0\.0\.1:\d+/[a-z0-9-]+/\d{8}/?$".to_string();
        config.fallback_urls = vec![server.url("/conocido-factcheck/20250101/")];
        config.http.base_delay_ms = 0;

        let mut scraper = FactCheckScraper::new(config, ScriptedLauncher::new(Site::default())).unwrap();
        let records = scraper.scrape(3).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Verificación número 7 sobre coches");
        listing.assert_hits_async(0).await;
    }
}
