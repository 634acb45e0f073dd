//! Command-line interface definitions for the fact-check scraper.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option can also come from an environment variable.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments.
///
/// Values given here override the ones loaded from `--config`.
///
/// # Examples
///
/// ```sh
/// # Scrape the ten most recent fact-checks
/// factcheck_news
///
/// # More articles, plain HTTP, custom store location
/// factcheck_news --limit 50 --no-browser --store ./out/factchecks.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Maximum number of fact-checks to scrape
    #[arg(short, long, env = "FACTCHECK_LIMIT", default_value_t = 10)]
    pub limit: usize,

    /// Do not consult robots.txt before fetching
    #[arg(long, env = "FACTCHECK_IGNORE_ROBOTS")]
    pub ignore_robots: bool,

    /// Fetch pages over plain HTTP instead of a headless browser
    #[arg(long, env = "FACTCHECK_NO_BROWSER")]
    pub no_browser: bool,

    /// Optional path to a YAML configuration file
    #[arg(short, long, env = "FACTCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON store the results are upserted into
    #[arg(short, long, env = "FACTCHECK_STORE", default_value = "data/factchecks.json")]
    pub store: PathBuf,

    /// Directory for the rolling `scraper` and `scraper_error` log files
    #[arg(long, env = "FACTCHECK_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["factcheck_news"]);

        assert_eq!(cli.limit, 10);
        assert!(!cli.ignore_robots);
        assert!(!cli.no_browser);
        assert_eq!(cli.config, None);
        assert_eq!(cli.store, PathBuf::from("data/factchecks.json"));
        assert_eq!(cli.log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "factcheck_news",
            "--limit",
            "25",
            "--ignore-robots",
            "--no-browser",
            "--config",
            "scraper.yaml",
            "--log-dir",
            "/var/log/factcheck",
        ]);

        assert_eq!(cli.limit, 25);
        assert!(cli.ignore_robots);
        assert!(cli.no_browser);
        assert_eq!(cli.config, Some(PathBuf::from("scraper.yaml")));
        assert_eq!(cli.log_dir, PathBuf::from("/var/log/factcheck"));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["factcheck_news", "-l", "3", "-s", "/tmp/out.json"]);

        assert_eq!(cli.limit, 3);
        assert_eq!(cli.store, PathBuf::from("/tmp/out.json"));
    }

    #[test]
    fn test_cli_rejects_negative_limit() {
        assert!(Cli::try_parse_from(["factcheck_news", "--limit", "-1"]).is_err());
    }
}
