use crate::harvest::ResolveStrategy;
use serde::Deserialize;
use std::fmt;

/// Main configuration structure for a harvest run
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
    pub harvest: HarvestConfig,
    pub output: OutputConfig,
}

/// Remote data API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint is appended to
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Query parameter that carries the API key
    #[serde(rename = "key-param", default = "default_key_param")]
    pub key_param: String,

    /// Per-request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Items requested per page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub endpoints: Endpoints,
}

/// Endpoint names and protocol fields of the remote API
///
/// Defaults follow the YouTube Data API v3.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub channels: String,
    #[serde(rename = "playlist-items")]
    pub playlist_items: String,
    pub videos: String,
    #[serde(rename = "comment-threads")]
    pub comment_threads: String,
    #[serde(rename = "cursor-param")]
    pub cursor_param: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            channels: "channels".to_string(),
            playlist_items: "playlistItems".to_string(),
            videos: "videos".to_string(),
            comment_threads: "commentThreads".to_string(),
            cursor_param: "pageToken".to_string(),
        }
    }
}

/// Retry and backoff configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry (milliseconds)
    #[serde(rename = "base-delay-ms", default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for any single retry delay (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Maximum attempts per call on one key, including the first
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Random perturbation applied to each delay, as a fraction
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// How long a key stays benched after a quota error when the server
    /// does not say. Unset means for the rest of the run.
    #[serde(rename = "quota-cooldown-secs", default)]
    pub quota_cooldown_secs: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            jitter: default_jitter(),
            quota_cooldown_secs: None,
        }
    }
}

/// One API key
#[derive(Clone, Deserialize)]
pub struct KeyEntry {
    pub label: String,
    pub token: String,
}

impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntry")
            .field("label", &self.label)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// What to harvest
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// Channel name, handle or identifier to start from
    pub resource: String,

    /// Discard previously written data and collect everything again
    #[serde(default)]
    pub overwrite: bool,

    /// Also probe children whose comment counter is missing
    #[serde(rename = "include-ambiguous", default)]
    pub include_ambiguous: bool,

    /// Collect comment threads after video details
    #[serde(default = "default_true")]
    pub comments: bool,

    /// Resolution strategies, tried in order
    #[serde(default = "ResolveStrategy::default_order")]
    pub strategies: Vec<ResolveStrategy>,

    /// Stop each comment collection after this many pages
    ///
    /// A capped child is written and enters the ledger like a complete one,
    /// so later runs do not fetch its remaining pages. Use `--fresh` to
    /// collect again after raising or removing the limit.
    #[serde(rename = "max-comment-pages", default)]
    pub max_comment_pages: Option<usize>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_key_param() -> String {
    "key".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    50
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    32_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_jitter() -> f64 {
    0.2
}

fn default_true() -> bool {
    true
}
