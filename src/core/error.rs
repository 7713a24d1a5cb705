use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("invalid metric type: {0:?}")]
    InvalidMetricKind(String),

    #[error("metric name is required")]
    EmptyMetricName,

    #[error("invalid {kind} value: {raw:?}")]
    InvalidMetricValue { kind: &'static str, raw: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Rendering error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type alias for pulse operations
pub type Result<T> = std::result::Result<T, PulseError>;

impl PulseError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a new render error
    pub fn render<S: Into<String>>(msg: S) -> Self {
        Self::Render(msg.into())
    }

    /// Returns true if the next report tick may succeed where this one failed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::UnexpectedStatus { .. } | Self::Http(_)
        )
    }

    /// Returns true for errors caused by bad input rather than by the system
    pub fn is_validation(&self) -> bool {
        self.category() == "validation"
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidMetricKind(_)
            | Self::EmptyMetricName
            | Self::InvalidMetricValue { .. }
            | Self::Config(_)
            | Self::Yaml(_) => "validation",
            Self::Network(_) | Self::UnexpectedStatus { .. } | Self::Http(_) => "transport",
            Self::Storage(_) | Self::Render(_) | Self::Io(_) | Self::Join(_) => "internal",
        }
    }
}
