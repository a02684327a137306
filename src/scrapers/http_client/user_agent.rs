//! User agent handling for HTTP requests.

use rand::Rng;

pub const USER_AGENT: &str = "flyerscout/0.1 (flyer catalog ingestion)";

/// Real browser user agents for impersonate mode.
/// Retailer sites commonly serve consent walls or empty shells to unknown agents.
pub const IMPERSONATE_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Safari on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    // Chrome on Android
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Mobile Safari/537.36",
];

/// Get a random user agent for impersonate mode.
pub fn random_user_agent() -> &'static str {
    let idx = rand::rng().random_range(0..IMPERSONATE_USER_AGENTS.len());
    IMPERSONATE_USER_AGENTS[idx]
}

/// Resolve user agent from config value.
/// - None => default flyerscout user agent
/// - "impersonate" => random real browser user agent
/// - other => custom user agent string
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config {
        None => USER_AGENT.to_string(),
        Some("impersonate") => random_user_agent().to_string(),
        Some(custom) => custom.to_string(),
    }
}
