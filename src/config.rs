//! Configuration management with TOML, environment variables, and CLI overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Origin of the offers endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Proxy URL (e.g., socks5://host:port)
    #[serde(default)]
    pub proxy: Option<String>,

    /// Run Chromium without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// User-Agent for static and API requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept-Language sent by the browser and HTTP clients
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Attempt ceiling for every retry loop
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Static page request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Offers endpoint request timeout in seconds
    #[serde(default = "default_api_timeout_secs")]
    pub api_timeout_secs: u64,

    /// Settle delay when the product heading never appears
    #[serde(default = "default_wait_seconds")]
    pub wait_seconds: u64,

    /// Browser navigation deadline
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// How long to wait for the product heading
    #[serde(default = "default_heading_timeout_secs")]
    pub heading_timeout_secs: u64,

    /// Best-effort network quiescence wait
    #[serde(default = "default_network_idle_timeout_secs")]
    pub network_idle_timeout_secs: u64,

    /// How long each attempt waits for the rating widget
    #[serde(default = "default_rating_timeout_secs")]
    pub rating_timeout_secs: u64,

    /// Offers requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Politeness delay between offer pages in milliseconds
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Length of one backoff unit in milliseconds
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Attribute grouping and dedup heuristics
    #[serde(default)]
    pub attributes: AttributeRules,
}

fn default_base_url() -> String {
    "https://kaspi.kz".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36"
        .to_string()
}

fn default_accept_language() -> String {
    "ru-RU,ru;q=0.9,en;q=0.8".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_api_timeout_secs() -> u64 {
    15
}

fn default_wait_seconds() -> u64 {
    2
}

fn default_navigation_timeout_secs() -> u64 {
    30
}

fn default_heading_timeout_secs() -> u64 {
    10
}

fn default_network_idle_timeout_secs() -> u64 {
    8
}

fn default_rating_timeout_secs() -> u64 {
    5
}

fn default_page_size() -> usize {
    50
}

fn default_page_delay_ms() -> u64 {
    500
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            proxy: None,
            headless: default_headless(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            api_timeout_secs: default_api_timeout_secs(),
            wait_seconds: default_wait_seconds(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            heading_timeout_secs: default_heading_timeout_secs(),
            network_idle_timeout_secs: default_network_idle_timeout_secs(),
            rating_timeout_secs: default_rating_timeout_secs(),
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            backoff_unit_ms: default_backoff_unit_ms(),
            format: OutputFormat::default(),
            attributes: AttributeRules::default(),
        }
    }
}

impl Config {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads configuration with fallback to default locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        // 1. Explicit path takes precedence
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        // 2. Try current directory
        let local_config = Path::new("config.toml");
        if local_config.exists() {
            debug!("Found config.toml in current directory");
            return Self::from_file(local_config);
        }

        // 3. Try XDG config directory
        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("kaspi-crawler").join("config.toml");
            if xdg_config.exists() {
                debug!("Found config in XDG config directory");
                return Self::from_file(xdg_config);
            }
        }

        // 4. Return default config
        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Applies environment variable overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(proxy) = std::env::var("KASPI_PROXY") {
            self.proxy = Some(proxy);
        }

        if let Ok(retries) = std::env::var("KASPI_MAX_RETRIES") {
            if let Ok(r) = retries.parse() {
                self.max_retries = r;
            }
        }

        if let Ok(timeout) = std::env::var("KASPI_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.timeout_secs = t;
            }
        }

        if let Ok(ua) = std::env::var("KASPI_USER_AGENT") {
            if !ua.trim().is_empty() {
                self.user_agent = ua;
            }
        }

        if let Ok(headless) = std::env::var("KASPI_HEADLESS") {
            if let Ok(h) = headless.parse() {
                self.headless = h;
            }
        }

        self
    }

    /// One backoff unit.
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

/// Heuristic constants for attribute grouping and dedup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeRules {
    /// Flat values longer than this many characters are treated as summary groups
    pub group_min_chars: usize,
    /// A summary group is redundant once this many individual keys appear in it
    pub min_matching_keys: usize,
    /// Keys containing this marker (case-insensitive) are always dropped
    pub general_marker: String,
    /// Name for a specification block without a heading
    pub default_group: String,
    /// Group collecting loose key/value pairs not seen in any block
    pub other_group: String,
}

impl Default for AttributeRules {
    fn default() -> Self {
        Self {
            group_min_chars: 100,
            min_matching_keys: 3,
            general_marker: "общ".to_string(),
            default_group: "Общие".to_string(),
            other_group: "Другие".to_string(),
        }
    }
}

impl AttributeRules {
    /// True when `name` carries the general marker, ignoring case.
    pub fn is_general(&self, name: &str) -> bool {
        let marker = self.general_marker.to_lowercase();
        !marker.is_empty() && name.to_lowercase().contains(&marker)
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "table" => Ok(OutputFormat::Table),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("Unknown format: {}. Use: json, table, markdown", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}
