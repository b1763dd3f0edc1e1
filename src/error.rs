use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to acquire rendering context: {0}")]
    ContextAcquisition(String),

    #[error("Rendering protocol error: {0}")]
    Protocol(String),

    #[error("Navigation timeout after {0}s")]
    NavigationTimeout(u64),

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Text recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}

impl ScoutError {
    /// Stable, machine-readable name used as the `error` field of API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "InvalidInput",
            Self::ContextAcquisition(_) => "ContextAcquisitionFailure",
            Self::Protocol(_) => "ProtocolFailure",
            Self::NavigationTimeout(_) => "NavigationTimeout",
            Self::ElementNotFound { .. } => "ElementNotFound",
            Self::RecognitionFailed(_) => "RecognitionFailure",
            Self::ConfigError(_) | Self::TomlDeError(_) | Self::TomlSerError(_) => {
                "ConfigurationError"
            }
            _ => "InternalError",
        }
    }

    /// Whether the pipeline may continue past this error.
    pub fn is_tolerated(&self) -> bool {
        matches!(
            self,
            Self::NavigationTimeout(_) | Self::ElementNotFound { .. }
        )
    }

    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidInput(_) => vec!["Provide a non-empty search term".into()],
            Self::ContextAcquisition(_) => vec![
                "Ensure Chrome/Chromium is installed".into(),
                "Try specifying Chrome path with --chrome-path or SCOUT_CHROME_PATH".into(),
                "In containers, keep browser.disable_sandbox = true".into(),
            ],
            Self::Protocol(_) => vec![
                "The browser may have crashed; retry the search".into(),
                "Run with --verbose to see the DevTools traffic".into(),
            ],
            Self::NavigationTimeout(timeout) => vec![
                format!("Increase timeout with --timeout {}", timeout + 30),
                "Check network connectivity".into(),
            ],
            Self::ElementNotFound { selector } => vec![format!(
                "Check if element '{}' still exists on the target site",
                selector
            )],
            Self::RecognitionFailed(_) => vec![
                "Ensure the tesseract binary is installed and on PATH".into(),
                "Set ocr.tesseract_path in the configuration file".into(),
                "Disable the OCR fallback with ocr.enabled = false".into(),
            ],
            Self::ConfigError(_) | Self::TomlDeError(_) => vec![
                "Check configuration file syntax".into(),
                "Use --config to specify a different config file".into(),
            ],
            _ => vec!["Run with --verbose for more details".into()],
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInput(_) => 2,
            Self::ContextAcquisition(_) | Self::Protocol(_) => 3,
            Self::NavigationTimeout(_) => 4,
            Self::ElementNotFound { .. } => 5,
            Self::RecognitionFailed(_) => 6,
            Self::ConfigError(_) | Self::TomlDeError(_) | Self::TomlSerError(_) => 7,
            _ => 1,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for ScoutError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Self::Protocol(err.to_string())
    }
}
