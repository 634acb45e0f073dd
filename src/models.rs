//! Data models for scraped fact-check articles.
//!
//! - [`ArticleRecord`]: one fact-check as extracted from a rendered page
//! - [`VerificationCategory`]: the verdict attached to a fact-check
//! - [`PersistSummary`]: counts reported after a batch is persisted

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict assigned by the fact-checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationCategory {
    #[serde(rename = "Falso")]
    Falso,
    #[serde(rename = "Engañoso")]
    Enganoso,
    #[serde(rename = "Verdad a medias")]
    VerdadAMedias,
    #[serde(rename = "Verdadero")]
    Verdadero,
}

impl VerificationCategory {
    /// All verdicts, in the order the text fallback checks them.
    pub const ALL: [VerificationCategory; 4] = [
        VerificationCategory::Falso,
        VerificationCategory::Enganoso,
        VerificationCategory::VerdadAMedias,
        VerificationCategory::Verdadero,
    ];

    /// The label as published on the site.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationCategory::Falso => "Falso",
            VerificationCategory::Enganoso => "Engañoso",
            VerificationCategory::VerdadAMedias => "Verdad a medias",
            VerificationCategory::Verdadero => "Verdadero",
        }
    }

    /// Look a published label up, ignoring case and surrounding whitespace.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().to_lowercase() == label)
    }

    /// Display color used by the site's highlighted verdict span.
    pub fn color(&self) -> &'static str {
        match self {
            VerificationCategory::Falso => "#E53935",
            VerificationCategory::Enganoso => "#FB8C00",
            VerificationCategory::VerdadAMedias => "#FDD835",
            VerificationCategory::Verdadero => "#43A047",
        }
    }
}

impl fmt::Display for VerificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fact-check article extracted from a single page.
///
/// `url` is the natural key. Every field is recomputed on each scrape;
/// merging with previously stored data is the store's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    /// Headline, normalized and capped at 250 characters.
    pub title: String,
    /// Absolute article URL.
    pub url: String,
    pub verification_category: Option<VerificationCategory>,
    pub publish_date: Option<NaiveDate>,
    /// The statement being checked, 20 to 500 characters.
    pub claim: Option<String>,
    /// Who made the claim.
    pub claim_source: Option<String>,
    /// Body text, evidence-bearing paragraphs first.
    pub content: Option<String>,
    /// Tags in document order.
    pub tags: Vec<String>,
    pub author: Option<String>,
    /// Absolute URL of the lead image.
    pub image_url: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl ArticleRecord {
    /// A record with only its identity fields set.
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            verification_category: None,
            publish_date: None,
            claim: None,
            claim_source: None,
            content: None,
            tags: Vec::new(),
            author: None,
            image_url: None,
            scraped_at: Utc::now(),
        }
    }
}

/// Outcome of persisting one scrape batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistSummary {
    pub total: usize,
    pub new: usize,
    pub updated: usize,
    pub failed: usize,
}

impl fmt::Display for PersistSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} new={} updated={} failed={}",
            self.total, self.new, self.updated, self.failed
        )
    }
}
