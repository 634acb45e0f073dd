//! Client identity (User-Agent) rotation.
//!
//! Identities come from a generator that synthesizes realistic, current
//! browser strings, or from a user-supplied list. When the list cannot be
//! loaded the source degrades to a fixed pool of five strings.

use rand::seq::IndexedRandom;
use rand::{Rng, rng};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Used whenever no generator is available.
pub const FALLBACK_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.212 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1",
];

const DESKTOP_PLATFORMS: &[&str] = &[
    "Windows NT 10.0; Win64; x64",
    "Macintosh; Intel Mac OS X 10_15_7",
    "X11; Linux x86_64",
];

const MOBILE_PLATFORMS: &[&str] = &[
    "Linux; Android 14; Pixel 8",
    "Linux; Android 13; SM-S918B",
];

#[derive(Debug, Clone)]
enum Generator {
    /// Build strings from platform and browser-version tables.
    Synthesized,
    /// Pick from a loaded list.
    Listed(Arc<Vec<String>>),
}

impl Generator {
    fn random(&self) -> Option<String> {
        match self {
            Generator::Synthesized => {
                if rng().random_bool(0.2) {
                    Some(synthesize_mobile())
                } else {
                    Some(synthesize_desktop())
                }
            }
            Generator::Listed(agents) => agents.choose(&mut rng()).cloned(),
        }
    }

    fn desktop(&self) -> Option<String> {
        match self {
            Generator::Synthesized => Some(synthesize_desktop()),
            Generator::Listed(agents) => {
                let desktop: Vec<&String> = agents.iter().filter(|a| !is_mobile(a)).collect();
                desktop.choose(&mut rng()).map(|a| (*a).clone())
            }
        }
    }
}

/// Supplies randomized identity strings.
#[derive(Debug, Clone)]
pub struct UserAgentSource {
    generator: Option<Generator>,
}

impl Default for UserAgentSource {
    fn default() -> Self {
        Self::new()
    }
}

impl UserAgentSource {
    /// Source backed by the synthesizing generator.
    pub fn new() -> Self {
        Self {
            generator: Some(Generator::Synthesized),
        }
    }

    /// Source that only ever uses the fallback pool.
    pub fn fallback_only() -> Self {
        Self { generator: None }
    }

    /// Source backed by an explicit list. An empty list degrades to the
    /// fallback pool.
    pub fn with_pool(agents: Vec<String>) -> Self {
        let agents: Vec<String> = agents
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if agents.is_empty() {
            warn!("Identity list is empty; using fallback user agents");
            return Self::fallback_only();
        }
        Self {
            generator: Some(Generator::Listed(Arc::new(agents))),
        }
    }

    /// Load a newline-delimited identity list. Unreadable files degrade to
    /// the fallback pool.
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let source = Self::with_pool(raw.lines().map(str::to_string).collect());
                if source.is_dynamic() {
                    info!(path = %path.display(), "Loaded identity list");
                }
                source
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read identity list; using fallback user agents");
                Self::fallback_only()
            }
        }
    }

    /// Build from an optional configured list path.
    pub fn from_config(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::from_file(p),
            None => Self::new(),
        }
    }

    /// Whether a generator (rather than the fallback pool) is in use.
    pub fn is_dynamic(&self) -> bool {
        self.generator.is_some()
    }

    /// Any identity, desktop or mobile.
    pub fn random_identity(&self) -> String {
        self.generator
            .as_ref()
            .and_then(Generator::random)
            .unwrap_or_else(|| pick(&FALLBACK_USER_AGENTS))
    }

    /// A desktop identity.
    pub fn desktop_identity(&self) -> String {
        if let Some(agent) = self.generator.as_ref().and_then(Generator::desktop) {
            return agent;
        }
        let desktop: Vec<&str> = FALLBACK_USER_AGENTS
            .iter()
            .copied()
            .filter(|a| !is_mobile(a))
            .collect();
        pick(&desktop)
    }
}

fn pick(pool: &[&str]) -> String {
    pool.choose(&mut rng())
        .copied()
        .unwrap_or(FALLBACK_USER_AGENTS[0])
        .to_string()
}

fn is_mobile(agent: &str) -> bool {
    agent.contains("Mobile") || agent.contains("Android") || agent.contains("iPhone")
}

fn synthesize_desktop() -> String {
    let mut r = rng();
    let platform = DESKTOP_PLATFORMS.choose(&mut r).copied().unwrap_or(DESKTOP_PLATFORMS[0]);
    match r.random_range(0..4) {
        0 => {
            let v = r.random_range(128..=134);
            format!("Mozilla/5.0 ({platform}; rv:{v}.0) Gecko/20100101 Firefox/{v}.0")
        }
        1 if platform.starts_with("Macintosh") => {
            let minor = r.random_range(0..=6);
            format!(
                "Mozilla/5.0 ({platform}) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.{minor} Safari/605.1.15"
            )
        }
        2 if platform.starts_with("Windows") => {
            let v = r.random_range(126..=132);
            format!(
                "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{v}.0.0.0 Safari/537.36 Edg/{v}.0.0.0"
            )
        }
        _ => {
            let v = r.random_range(126..=132);
            format!("Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{v}.0.0.0 Safari/537.36")
        }
    }
}

fn synthesize_mobile() -> String {
    let mut r = rng();
    if r.random_bool(0.5) {
        let major = r.random_range(16..=18);
        format!(
            "Mozilla/5.0 (iPhone; CPU iPhone OS {major}_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/{major}.0 Mobile/15E148 Safari/604.1"
        )
    } else {
        let platform = MOBILE_PLATFORMS.choose(&mut r).copied().unwrap_or(MOBILE_PLATFORMS[0]);
        let v = r.random_range(126..=132);
        format!(
            "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{v}.0.0.0 Mobile Safari/537.36"
        )
    }
}
