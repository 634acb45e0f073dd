//! JSON record store for scraped fact-checks.
//!
//! The store keeps a category table and the article list in one JSON file:
//!
//! ```text
//! {
//!   "categories": [{ "name": "Falso", "description": "...", "color": "#E53935" }],
//!   "articles":   [{ "url": "...", "title": "...", ... }]
//! }
//! ```
//!
//! Articles are upserted by URL. Each record is validated on its own, so a
//! bad record is counted as failed without affecting the rest of the batch.

use crate::error::ScrapeError;
use crate::models::{ArticleRecord, PersistSummary, VerificationCategory};
use crate::text::char_len;
use crate::utils::ensure_writable_dir;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const DEFAULT_CATEGORY_COLOR: &str = "#CCCCCC";
pub const TITLE_MIN: usize = 10;
pub const TITLE_MAX: usize = 250;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    pub description: String,
    pub color: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    categories: Vec<CategoryEntry>,
    #[serde(default)]
    articles: Vec<ArticleRecord>,
}

/// File-backed article store.
#[derive(Debug)]
pub struct FactCheckStore {
    path: PathBuf,
    data: StoreData,
    by_url: HashMap<String, usize>,
}

impl FactCheckStore {
    /// Load `path`, or start empty if it does not exist yet.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ScrapeError> {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => StoreData::default(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Store does not exist yet; starting empty");
                StoreData::default()
            }
            Err(e) => return Err(e.into()),
        };

        let by_url = data
            .articles
            .iter()
            .enumerate()
            .map(|(i, a)| (a.url.clone(), i))
            .collect();
        info!(articles = data.articles.len(), "Opened store");
        Ok(Self { path, data, by_url })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn articles(&self) -> &[ArticleRecord] {
        &self.data.articles
    }

    pub fn categories(&self) -> &[CategoryEntry] {
        &self.data.categories
    }

    pub fn get(&self, url: &str) -> Option<&ArticleRecord> {
        self.by_url.get(url).map(|&i| &self.data.articles[i])
    }

    /// Find a category by name, creating it if missing.
    pub fn get_or_create_category(&mut self, name: &str) -> &CategoryEntry {
        let idx = match self.data.categories.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                let color = VerificationCategory::from_label(name)
                    .map(|c| c.color())
                    .unwrap_or(DEFAULT_CATEGORY_COLOR);
                debug!(name, color, "Creating verification category");
                self.data.categories.push(CategoryEntry {
                    name: name.to_string(),
                    description: format!("Verificación: {name}"),
                    color: color.to_string(),
                });
                self.data.categories.len() - 1
            }
        };
        &self.data.categories[idx]
    }

    /// Upsert a batch and report what happened.
    #[instrument(level = "info", skip_all, fields(batch = records.len()))]
    pub fn upsert_all(&mut self, records: Vec<ArticleRecord>) -> PersistSummary {
        let mut summary = PersistSummary {
            total: records.len(),
            ..PersistSummary::default()
        };

        for record in records {
            if let Err(reason) = validate(&record) {
                warn!(url = %record.url, %reason, "Rejected record");
                summary.failed += 1;
                continue;
            }
            if let Some(category) = record.verification_category {
                self.get_or_create_category(category.as_str());
            }

            match self.by_url.get(&record.url) {
                Some(&idx) => {
                    let stored = &mut self.data.articles[idx];
                    merge_into(stored, record);
                    summary.updated += 1;
                }
                None => {
                    self.by_url.insert(record.url.clone(), self.data.articles.len());
                    self.data.articles.push(record);
                    summary.new += 1;
                }
            }
        }

        info!(%summary, "Persisted batch");
        summary
    }

    /// Write the store atomically (temp file, then rename).
    #[instrument(level = "info", skip_all, fields(path = %self.path.display()))]
    pub async fn save(&self) -> Result<(), ScrapeError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure_writable_dir(&dir).await?;

        let json = serde_json::to_string_pretty(&self.data)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        info!(articles = self.data.articles.len(), "Wrote store");
        Ok(())
    }
}

/// Gate applied before a record is stored.
fn validate(record: &ArticleRecord) -> Result<(), String> {
    let url = Url::parse(&record.url).map_err(|e| format!("url is not absolute: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {}", url.scheme()));
    }
    let len = char_len(&record.title);
    if !(TITLE_MIN..=TITLE_MAX).contains(&len) {
        return Err(format!("title has {len} characters"));
    }
    Ok(())
}

/// Overwrite mutable fields, keeping the stored date, category and image
/// when the fresh record lacks them.
fn merge_into(stored: &mut ArticleRecord, fresh: ArticleRecord) {
    let publish_date = fresh.publish_date.or(stored.publish_date);
    let verification_category = fresh.verification_category.or(stored.verification_category);
    let image_url = fresh.image_url.or_else(|| stored.image_url.take());
    *stored = ArticleRecord {
        publish_date,
        verification_category,
        image_url,
        ..fresh
    };
}
