//! Scoped headless-browser sessions.
//!
//! [`BrowserLauncher`] starts a browser for one identity and hands back a
//! [`BrowserDriver`]. [`with_browser`] wraps the launch/use/close cycle so a
//! session is always torn down before control returns, whether the work
//! succeeded or failed. Sessions are never shared.
//!
//! The production implementation drives Chrome over CDP with `chromiumoxide`.

use crate::config::BrowserConfig;
use crate::error::ScrapeError;
use chromiumoxide::{Browser, BrowserConfig as CdpConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Operations the scraper needs from a rendered page.
///
/// Callers drive sessions sequentially and never require `Send` futures,
/// so the methods are plain `async fn`.
#[allow(async_fn_in_trait)]
pub trait BrowserDriver {
    /// Navigate and wait for the load to finish.
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError>;

    /// Current rendered HTML.
    async fn html(&mut self) -> Result<String, ScrapeError>;

    /// Wait until `selector` matches, or fail with [`ScrapeError::Timeout`].
    async fn wait_for(&mut self, selector: &str, limit: Duration) -> Result<(), ScrapeError>;

    /// Whether `selector` matches a displayed element with a non-empty box.
    async fn is_visible(&mut self, selector: &str) -> Result<bool, ScrapeError>;

    /// Scroll the first match into view and invoke its click action.
    async fn click(&mut self, selector: &str) -> Result<(), ScrapeError>;

    /// Terminate the browser process.
    async fn close(self) -> Result<(), ScrapeError>;
}

/// Starts browser sessions.
#[allow(async_fn_in_trait)]
pub trait BrowserLauncher {
    type Driver: BrowserDriver;

    async fn launch(&self, identity: &str) -> Result<Self::Driver, ScrapeError>;
}

/// Run `f` inside a fresh session and always close it afterwards.
///
/// The outcome of `f` is returned unchanged; a failure to close is logged
/// and otherwise ignored.
pub async fn with_browser<L, T, F>(launcher: &L, identity: &str, f: F) -> Result<T, ScrapeError>
where
    L: BrowserLauncher,
    F: AsyncFnOnce(&mut L::Driver) -> Result<T, ScrapeError>,
{
    let mut driver = launcher.launch(identity).await?;
    let outcome = f(&mut driver).await;
    if let Err(e) = driver.close().await {
        warn!(error = %e, "Browser teardown failed");
    }
    outcome
}

/// Launches local Chrome/Chromium instances.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    headless: bool,
    viewport: (u32, u32),
    executable: Option<PathBuf>,
    navigation_timeout: Duration,
}

impl ChromeLauncher {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            headless: config.headless,
            viewport: (config.viewport_width, config.viewport_height),
            executable: config.chrome_executable.clone(),
            navigation_timeout: config.navigation_timeout(),
        }
    }

    fn cdp_config(&self, identity: &str) -> Result<CdpConfig, ScrapeError> {
        let (width, height) = self.viewport;
        let mut builder = CdpConfig::builder()
            .window_size(width, height)
            .request_timeout(self.navigation_timeout)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-notifications")
            .arg("--disable-popup-blocking")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={identity}"));

        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(ScrapeError::Browser)
    }
}

impl BrowserLauncher for ChromeLauncher {
    type Driver = ChromeDriver;

    #[instrument(level = "debug", skip_all, fields(headless = self.headless))]
    async fn launch(&self, identity: &str) -> Result<ChromeDriver, ScrapeError> {
        let config = self.cdp_config(identity)?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(ScrapeError::browser)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let mut driver = ChromeDriver::detached(browser, handler, self.navigation_timeout);
                driver.shutdown().await;
                return Err(ScrapeError::browser(e));
            }
        };

        info!("Browser session started");
        Ok(ChromeDriver {
            browser,
            page: Some(page),
            handler,
            navigation_timeout: self.navigation_timeout,
        })
    }
}

/// One Chrome process with a single tab.
pub struct ChromeDriver {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromeDriver {
    fn detached(browser: Browser, handler: JoinHandle<()>, navigation_timeout: Duration) -> Self {
        Self {
            browser,
            page: None,
            handler,
            navigation_timeout,
        }
    }

    fn page(&self) -> Result<&Page, ScrapeError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScrapeError::Browser("no open page".to_string()))
    }

    async fn eval_bool(&self, script: String) -> Result<bool, ScrapeError> {
        self.page()?
            .evaluate(script)
            .await
            .map_err(ScrapeError::browser)?
            .into_value::<bool>()
            .map_err(ScrapeError::browser)
    }

    async fn shutdown(&mut self) -> Option<ScrapeError> {
        let mut failure = None;
        if let Err(e) = self.browser.close().await {
            failure = Some(ScrapeError::browser(e));
        }
        if let Err(e) = self.browser.wait().await {
            failure.get_or_insert(ScrapeError::Io(e));
        }
        self.handler.abort();
        failure
    }
}

/// JSON-quote a selector for embedding in a script.
fn js_selector(selector: &str) -> Result<String, ScrapeError> {
    Ok(serde_json::to_string(selector)?)
}

impl BrowserDriver for ChromeDriver {
    #[instrument(level = "debug", skip(self))]
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError> {
        let page = self.page()?;
        match timeout(self.navigation_timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::browser(e)),
            Err(_) => Err(ScrapeError::Timeout {
                what: format!("navigation to {url}"),
                secs: self.navigation_timeout.as_secs(),
            }),
        }
    }

    async fn html(&mut self) -> Result<String, ScrapeError> {
        self.page()?.content().await.map_err(ScrapeError::browser)
    }

    async fn wait_for(&mut self, selector: &str, limit: Duration) -> Result<(), ScrapeError> {
        let started = Instant::now();
        loop {
            if self.page()?.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if started.elapsed() >= limit {
                return Err(ScrapeError::Timeout {
                    what: format!("selector {selector}"),
                    secs: limit.as_secs(),
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool, ScrapeError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                return style.display !== 'none' && style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0;
            }})()"#,
            sel = js_selector(selector)?
        );
        self.eval_bool(script).await
    }

    async fn click(&mut self, selector: &str) -> Result<(), ScrapeError> {
        let element = self
            .page()?
            .find_element(selector)
            .await
            .map_err(ScrapeError::browser)?;
        element.scroll_into_view().await.map_err(ScrapeError::browser)?;

        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            sel = js_selector(selector)?
        );
        if self.eval_bool(script).await? {
            Ok(())
        } else {
            Err(ScrapeError::Browser(format!("{selector} disappeared before the click")))
        }
    }

    async fn close(mut self) -> Result<(), ScrapeError> {
        self.page = None;
        match self.shutdown().await {
            None => {
                debug!("Browser session closed");
                Ok(())
            }
            Some(e) => Err(e),
        }
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        // Covers cancellation; dropping `Browser` kills the child process.
        self.handler.abort();
    }
}
