//! Configuration management for gateway-sync
//!
//! Configuration comes from environment variables, optionally layered on top
//! of a YAML file. Environment values always win over file values so that a
//! checked-in file can hold defaults while secrets stay in the environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Fallback chunk size when the configured one is missing or not positive
pub const DEFAULT_LIST_ITEM_SIZE: usize = 1000;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Gateway API account and list sizing
    #[serde(default)]
    pub cloudflare: CloudflareConfig,

    /// Domain list sources
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Run behavior flags
    #[serde(default)]
    pub behavior: BehaviorConfig,

    /// Retry configuration for API calls and downloads
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP client limits
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // First, expand environment variables in the YAML string
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Override fields with values found through `lookup`
    ///
    /// `lookup` maps a variable name to its value; blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(token) = get("CLOUDFLARE_API_TOKEN") {
            self.cloudflare.api_token = Some(token);
        }
        if let Some(key) = get("CLOUDFLARE_API_KEY") {
            self.cloudflare.api_key = Some(key);
        }
        if let Some(account) = get("CLOUDFLARE_ACCOUNT_ID") {
            self.cloudflare.account_id = account;
        }
        if let Some(email) = get("CLOUDFLARE_ACCOUNT_EMAIL") {
            self.cloudflare.account_email = Some(email);
        }
        if let Some(host) = get("CLOUDFLARE_API_HOST") {
            self.cloudflare.api_host = host;
        }
        if let Some(size) = get("CLOUDFLARE_LIST_ITEM_SIZE") {
            self.cloudflare.list_item_size = parse_list_item_size(&size);
        }
        if let Some(limit) = get("CLOUDFLARE_LIST_ITEM_LIMIT") {
            if let Ok(limit) = limit.parse() {
                self.cloudflare.list_item_limit = limit;
            }
        }

        let allow = get("ALLOWLIST_URLS").or_else(|| get("USER_DEFINED_ALLOWLIST_URLS"));
        if let Some(value) = allow {
            self.sources.allow_urls = split_multi_value(&value);
        }
        let block = get("BLOCKLIST_URLS").or_else(|| get("USER_DEFINED_BLOCKLIST_URLS"));
        if let Some(value) = block {
            self.sources.block_urls = split_multi_value(&value);
        }

        if let Some(v) = get("DRY_RUN") {
            self.behavior.dry_run = parse_flag(&v);
        }
        if let Some(v) = get("BLOCK_PAGE_ENABLED") {
            self.behavior.block_page_enabled = parse_flag(&v);
        }
        if let Some(v) = get("BLOCK_BASED_ON_SNI") {
            self.behavior.block_based_on_sni = parse_flag(&v);
        }

        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = get("LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Check that everything needed to talk to the API is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cf = &self.cloudflare;

        if cf.api_token.is_none() && cf.api_key.is_none() {
            return Err(ConfigError::MissingRequired(
                "one of CLOUDFLARE_API_TOKEN or CLOUDFLARE_API_KEY".to_string(),
            ));
        }
        if cf.api_token.is_none() && cf.account_email.is_none() {
            return Err(ConfigError::MissingRequired(
                "CLOUDFLARE_ACCOUNT_EMAIL (required with CLOUDFLARE_API_KEY)".to_string(),
            ));
        }
        if cf.account_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "CLOUDFLARE_ACCOUNT_ID".to_string(),
            ));
        }
        if !(cf.api_host.starts_with("http://") || cf.api_host.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(format!(
                "CLOUDFLARE_API_HOST must be an http(s) URL, got {}",
                cf.api_host
            )));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue(
                "retry.backoff_multiplier must be >= 1.0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Gateway API account configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudflareConfig {
    /// Scoped API token (preferred)
    #[serde(default)]
    pub api_token: Option<String>,

    /// Legacy global API key, used together with `account_email`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Account identifier
    #[serde(default)]
    pub account_id: String,

    /// Account email for legacy key authentication
    #[serde(default)]
    pub account_email: Option<String>,

    /// API base URL
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Maximum number of entries per created list
    #[serde(default = "default_list_item_size")]
    pub list_item_size: usize,

    /// Soft limit on the total number of entries; exceeding it only warns
    #[serde(default = "default_list_item_limit")]
    pub list_item_limit: usize,
}

impl CloudflareConfig {
    /// Chunk size to use, falling back to the default when not positive
    pub fn effective_list_item_size(&self) -> usize {
        if self.list_item_size == 0 {
            DEFAULT_LIST_ITEM_SIZE
        } else {
            self.list_item_size
        }
    }

    /// Credentials to authenticate with, preferring the API token
    pub fn credentials(&self) -> Option<Credentials> {
        if let Some(token) = &self.api_token {
            return Some(Credentials::Token(token.clone()));
        }
        match (&self.api_key, &self.account_email) {
            (Some(key), Some(email)) => Some(Credentials::GlobalKey {
                email: email.clone(),
                key: key.clone(),
            }),
            _ => None,
        }
    }
}

impl Default for CloudflareConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            api_key: None,
            account_id: String::new(),
            account_email: None,
            api_host: default_api_host(),
            list_item_size: default_list_item_size(),
            list_item_limit: default_list_item_limit(),
        }
    }
}

fn default_api_host() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_list_item_size() -> usize {
    DEFAULT_LIST_ITEM_SIZE
}

fn default_list_item_limit() -> usize {
    300_000
}

/// How requests authenticate against the API
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `Authorization: Bearer <token>`
    Token(String),
    /// `X-Auth-Email` / `X-Auth-Key` pair
    GlobalKey {
        /// Account email
        email: String,
        /// Global API key
        key: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Token(_) => f.write_str("Credentials::Token(<redacted>)"),
            Credentials::GlobalKey { email, .. } => f
                .debug_struct("Credentials::GlobalKey")
                .field("email", email)
                .field("key", &"<redacted>")
                .finish(),
        }
    }
}

/// Domain list sources
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SourcesConfig {
    /// Allowlist source URLs, fetched in order
    #[serde(default)]
    pub allow_urls: Vec<String>,

    /// Blocklist source URLs, fetched in order
    #[serde(default)]
    pub block_urls: Vec<String>,
}

/// Run behavior flags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BehaviorConfig {
    /// Compute and log changes without creating, updating or deleting anything
    #[serde(default)]
    pub dry_run: bool,

    /// Show the block page for matched requests
    #[serde(default)]
    pub block_page_enabled: bool,

    /// Also create a connection-layer (SNI) rule
    #[serde(default)]
    pub block_based_on_sni: bool,

    /// Pause between cleanup and creation, in milliseconds
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            block_page_enabled: false,
            block_based_on_sni: false,
            settle_delay_ms: default_settle_delay(),
        }
    }
}

fn default_settle_delay() -> u64 {
    2000
}

/// Retry configuration for external calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Whether to add jitter to backoff
    #[serde(default = "default_jitter")]
    pub jitter: bool,

    /// Total time budget for one logical operation, in milliseconds
    #[serde(default = "default_max_elapsed")]
    pub max_elapsed_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
            max_elapsed_ms: default_max_elapsed(),
        }
    }
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    1.5
}

fn default_jitter() -> bool {
    true
}

fn default_max_elapsed() -> u64 {
    120_000 // 2 minutes
}

/// Limits for the HTTP clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Minimum interval between requests in milliseconds
    #[serde(default)]
    pub min_interval_ms: u64,

    /// Maximum number of concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 0,
            max_concurrent: default_max_concurrent(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_max_concurrent() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (`pretty` or `json`)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Parse a chunk size, falling back to the default for anything not positive
pub fn parse_list_item_size(value: &str) -> usize {
    match value.trim().parse::<i64>() {
        Ok(v) if v > 0 => v as usize,
        _ => DEFAULT_LIST_ITEM_SIZE,
    }
}

/// `1` or `true` (any case) enable a flag
fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Split a newline and/or comma separated value into trimmed items
pub fn split_multi_value(value: &str) -> Vec<String> {
    value
        .replace('\r', "")
        .split(['\n', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
