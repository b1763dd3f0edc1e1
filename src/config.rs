use crate::{Result, ScoutError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Minimum number of prices a strategy must find before cheaper strategies are trusted.
pub const DEFAULT_MIN_CONFIDENCE: usize = 5;

pub const QUERY_PLACEHOLDER: &str = "{query}";

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    pub chrome_path: Option<PathBuf>,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_true")]
    pub block_resources: bool,
    #[serde(default = "default_blocked_resource_types")]
    pub blocked_resource_types: Vec<String>,
    #[serde(default = "default_true")]
    pub disable_gpu: bool,
    #[serde(default = "default_true")]
    pub disable_sandbox: bool,
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_seconds: u64,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    /// Search URL with a `{query}` placeholder for the escaped term.
    #[serde(default = "default_search_url_template")]
    pub search_url_template: String,
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout_seconds: u64,
    #[serde(default = "default_consent_timeout")]
    pub consent_timeout_ms: u64,
    #[serde(default = "default_consent_selectors")]
    pub consent_selectors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_currency_marker")]
    pub currency_marker: String,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: usize,
    /// Price element selectors, most specific first.
    #[serde(default = "default_price_selectors")]
    pub price_selectors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OcrConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub tesseract_path: Option<PathBuf>,
    #[serde(default = "default_ocr_language")]
    pub language: String,
    #[serde(default = "default_tile_height")]
    pub tile_height: u32,
    #[serde(default = "default_ocr_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_max_sessions")]
    pub max_concurrent_sessions: usize,
    /// How long a request waits for a free rendering context before giving up.
    #[serde(default = "default_session_wait")]
    pub session_wait_seconds: u64,
}

fn default_true() -> bool {
    true
}
fn default_headless() -> bool {
    true
}
fn default_window_width() -> u32 {
    1366
}
fn default_window_height() -> u32 {
    768
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string()
}
fn default_blocked_resource_types() -> Vec<String> {
    vec!["Image".to_string(), "Font".to_string(), "Media".to_string()]
}
fn default_launch_timeout() -> u64 {
    30
}
fn default_search_url_template() -> String {
    "https://www.takealot.com/all?qsearch={query}".to_string()
}
fn default_navigation_timeout() -> u64 {
    crate::timeouts::secs::NAVIGATION
}
fn default_consent_timeout() -> u64 {
    crate::timeouts::ms::CONSENT_PROBE
}
fn default_consent_selectors() -> Vec<String> {
    vec![
        "button[data-ref=\"cookies-gdpr-banner-accept-button\"]".to_string(),
        "#onetrust-accept-btn-handler".to_string(),
        ".cookies-banner-module_cookie-banner button".to_string(),
        "button[aria-label*=\"Accept\"]".to_string(),
    ]
}
fn default_currency_marker() -> String {
    "R".to_string()
}
fn default_min_confidence() -> usize {
    DEFAULT_MIN_CONFIDENCE
}
fn default_price_selectors() -> Vec<String> {
    vec![
        "[data-ref=\"price\"]".to_string(),
        "span.currency".to_string(),
        "[itemprop=\"price\"]".to_string(),
        ".price".to_string(),
        "[class*=\"price\"]".to_string(),
    ]
}
fn default_ocr_language() -> String {
    "eng".to_string()
}
fn default_tile_height() -> u32 {
    4000
}
fn default_ocr_timeout() -> u64 {
    crate::timeouts::secs::OCR
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_http_port() -> u16 {
    3000
}
fn default_max_sessions() -> usize {
    4
}
fn default_session_wait() -> u64 {
    crate::timeouts::secs::SESSION_WAIT
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: default_headless(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: default_user_agent(),
            block_resources: true,
            blocked_resource_types: default_blocked_resource_types(),
            disable_gpu: true,
            disable_sandbox: true,
            launch_timeout_seconds: default_launch_timeout(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            search_url_template: default_search_url_template(),
            navigation_timeout_seconds: default_navigation_timeout(),
            consent_timeout_ms: default_consent_timeout(),
            consent_selectors: default_consent_selectors(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            currency_marker: default_currency_marker(),
            min_confidence: default_min_confidence(),
            price_selectors: default_price_selectors(),
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tesseract_path: None,
            language: default_ocr_language(),
            tile_height: default_tile_height(),
            timeout_seconds: default_ocr_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
            max_concurrent_sessions: default_max_sessions(),
            session_wait_seconds: default_session_wait(),
        }
    }
}

impl SiteConfig {
    /// Escapes `term` into the search template.
    pub fn search_url(&self, term: &str) -> Result<url::Url> {
        let escaped: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
        let raw = self.search_url_template.replace(QUERY_PLACEHOLDER, &escaped);
        url::Url::parse(&raw).map_err(|e| ScoutError::ConfigError(format!("{}: {}", raw, e)))
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    default_config_dir().map(|p| p.join("config.toml"))
}

pub fn default_config_dir() -> Result<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .map(|p| p.join("price-scout"))
        .ok_or_else(|| ScoutError::ConfigError("Could not determine config directory".into()))
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut layers = Vec::new();

        let global_path = default_config_path()?;
        if global_path.exists() {
            layers.push(global_path);
        }

        let project_path = PathBuf::from(".price-scout.toml");
        if project_path.exists() {
            layers.push(project_path);
        }

        let mut config = Self::from_layers(&layers)?;
        config.load_from_env();

        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Reads each file in order, later files overriding only the keys they set.
    pub fn from_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Table::new();
        for path in paths {
            let content = std::fs::read_to_string(path)?;
            let layer: toml::Table = toml::from_str(&content)?;
            merge_tables(&mut merged, layer);
        }
        Ok(toml::Value::Table(merged).try_into::<Config>()?)
    }

    pub fn load_with_overrides(&self, cli_overrides: ConfigOverrides) -> Self {
        let mut config = self.clone();

        if let Some(headless) = cli_overrides.headless {
            config.browser.headless = headless;
        }
        if let Some(chrome_path) = cli_overrides.chrome_path {
            config.browser.chrome_path = Some(chrome_path);
        }
        if let Some(timeout) = cli_overrides.timeout {
            config.site.navigation_timeout_seconds = timeout;
        }
        if let Some(threshold) = cli_overrides.threshold {
            config.extraction.min_confidence = threshold;
        }
        if let Some(port) = cli_overrides.port {
            config.server.port = port;
        }

        config
    }

    fn load_from_env(&mut self) {
        if let Ok(path) = std::env::var("SCOUT_CHROME_PATH") {
            self.browser.chrome_path = Some(PathBuf::from(path));
        }
        if let Ok(headless) = std::env::var("SCOUT_HEADLESS") {
            self.browser.headless = headless == "true" || headless == "1";
        }
        if let Ok(timeout) = std::env::var("SCOUT_TIMEOUT")
            && let Ok(timeout) = timeout.parse()
        {
            self.site.navigation_timeout_seconds = timeout;
        }
        if let Ok(threshold) = std::env::var("SCOUT_THRESHOLD")
            && let Ok(threshold) = threshold.parse()
        {
            self.extraction.min_confidence = threshold;
        }
        if let Ok(path) = std::env::var("SCOUT_TESSERACT_PATH") {
            self.ocr.tesseract_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.site.navigation_timeout_seconds == 0 {
            return Err(ScoutError::ConfigError(
                "navigation_timeout_seconds must be greater than 0".into(),
            ));
        }

        if self.browser.launch_timeout_seconds == 0 {
            return Err(ScoutError::ConfigError(
                "launch_timeout_seconds must be greater than 0".into(),
            ));
        }

        if self.extraction.min_confidence == 0 {
            return Err(ScoutError::ConfigError(
                "min_confidence must be greater than 0".into(),
            ));
        }

        if !self.site.search_url_template.contains(QUERY_PLACEHOLDER) {
            return Err(ScoutError::ConfigError(format!(
                "search_url_template must contain {}",
                QUERY_PLACEHOLDER
            )));
        }
        self.site.search_url("probe")?;

        if self.extraction.price_selectors.is_empty() {
            return Err(ScoutError::ConfigError(
                "price_selectors must list at least one selector".into(),
            ));
        }

        if self.ocr.tile_height < 100 {
            return Err(ScoutError::ConfigError(
                "ocr.tile_height must be at least 100 pixels".into(),
            ));
        }

        if self.server.max_concurrent_sessions == 0 {
            return Err(ScoutError::ConfigError(
                "max_concurrent_sessions must be greater than 0".into(),
            ));
        }

        if self.server.session_wait_seconds == 0 {
            return Err(ScoutError::ConfigError(
                "session_wait_seconds must be greater than 0".into(),
            ));
        }

        if let Some(ref path) = self.browser.chrome_path
            && !path.exists()
        {
            return Err(ScoutError::ConfigError(format!(
                "Chrome path does not exist: {}",
                path.display()
            )));
        }

        if let Some(ref path) = self.ocr.tesseract_path
            && !path.exists()
        {
            return Err(ScoutError::ConfigError(format!(
                "Tesseract path does not exist: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn show(&self) -> String {
        format!(
            r#"Browser:
  Chrome Path: {}
  Headless: {}
  Viewport: {}x{}
  Blocked Resources: {}

Site:
  Search URL: {}
  Navigation Timeout: {}s

Extraction:
  Currency Marker: {}
  Min Confidence: {}
  Price Selectors: {}

OCR:
  Enabled: {}
  Tesseract: {}

Server:
  Listen: {}:{}
  Max Sessions: {}
"#,
            self.browser
                .chrome_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "auto-detect".into()),
            self.browser.headless,
            self.browser.window_width,
            self.browser.window_height,
            if self.browser.block_resources {
                self.browser.blocked_resource_types.join(", ")
            } else {
                "none".into()
            },
            self.site.search_url_template,
            self.site.navigation_timeout_seconds,
            self.extraction.currency_marker,
            self.extraction.min_confidence,
            self.extraction.price_selectors.len(),
            self.ocr.enabled,
            self.ocr
                .tesseract_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "auto-detect".into()),
            self.server.host,
            self.server.port,
            self.server.max_concurrent_sessions,
        )
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(overlay_table) => {
                if let Some(toml::Value::Table(base_table)) = base.get_mut(&key) {
                    merge_tables(base_table, overlay_table);
                    continue;
                }
                base.insert(key, toml::Value::Table(overlay_table));
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigOverrides {
    pub headless: Option<bool>,
    pub chrome_path: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub threshold: Option<usize>,
    pub port: Option<u16>,
}
