//! Persistence of scraped records.
//!
//! - [`store`]: JSON record store with per-URL upsert and a category table
//!
//! # Output Structure
//!
//! ```text
//! data/
//! └── factchecks.json   # categories + articles, rewritten atomically
//! ```

pub mod store;
