//! # factcheck_news
//!
//! Scrapes fact-check articles from Newtral and normalizes them into
//! structured [`ArticleRecord`]s.
//!
//! ## Pipeline
//!
//! 1. **Identity**: pick a desktop User-Agent for the run
//! 2. **Discovery**: walk the listing's "load more" pagination in a headless
//!    browser (or read the first page over HTTP)
//! 3. **Extraction**: load each article in its own session and run the
//!    per-field selector cascades
//! 4. **Persistence**: upsert the records into a JSON store (binary only)
//!
//! Everything runs strictly one step at a time. robots.txt is honored unless
//! disabled, and every failure below the batch level is logged and skipped.
//!
//! ```no_run
//! use factcheck_news::{FactCheckScraper, ScraperConfig};
//!
//! # async fn run() -> Result<(), factcheck_news::ScrapeError> {
//! let mut scraper = FactCheckScraper::from_config(ScraperConfig::default())?;
//! for record in scraper.scrape(5).await {
//!     println!("{} {:?}", record.title, record.verification_category);
//! }
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod config;
pub mod dates;
pub mod error;
pub mod fetcher;
pub mod identity;
pub mod models;
pub mod outputs;
pub mod robots;
pub mod scrapers;
pub mod text;
pub mod utils;

pub use config::{ScrapeMode, ScraperConfig};
pub use dates::parse_date;
pub use error::{FetchError, ScrapeError};
pub use models::{ArticleRecord, PersistSummary, VerificationCategory};
pub use outputs::store::FactCheckStore;
pub use scrapers::newtral::FactCheckScraper;
