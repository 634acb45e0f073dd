//! Fact-check scraping.
//!
//! The pipeline runs in two phases, like every source scraper here:
//!
//! 1. **Discovery**: enumerate article URLs from the listing page
//! 2. **Extraction**: load each article and turn it into an `ArticleRecord`
//!
//! # Submodules
//!
//! | Module | Role |
//! |--------|------|
//! | [`discovery`] | Listing scan with "load more" pagination and fallback URLs |
//! | [`extract`] | Per-field selector cascades with validation |
//! | [`newtral`] | The engine tying discovery, robots checks and extraction together |

pub mod discovery;
pub mod extract;
pub mod newtral;
