//! HTTP rate limiting configuration.

use serde::{Deserialize, Serialize};

/// Per-client token bucket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether the limiter is installed.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Tokens refilled per second.
    #[serde(default = "default_per_second")]
    pub requests_per_second: f64,
    /// Bucket size.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            requests_per_second: default_per_second(),
            burst: default_burst(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_per_second() -> f64 {
    1.0
}

fn default_burst() -> u32 {
    5
}
