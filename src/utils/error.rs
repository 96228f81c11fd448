use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Audio tag error: {0}")]
    TagError(#[from] lofty::error::LoftyError),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Relay error: {message}")]
    RelayError { message: String },

    #[error("Flow step '{step}' failed: {message}")]
    FlowError { step: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Server,
    Configuration,
    Data,
    FileSystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl HarnessError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn relay(message: impl Into<String>) -> Self {
        Self::RelayError {
            message: message.into(),
        }
    }

    pub fn flow(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FlowError {
            step: step.into(),
            message: message.into(),
        }
    }

    /// 伺服器回應的 HTTP 狀態碼（若有）
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::ApiError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) | Self::RelayError { .. } => ErrorCategory::Network,
            Self::HttpStatus { .. } | Self::FlowError { .. } => ErrorCategory::Server,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. }
            | Self::UrlError(_) => ErrorCategory::Configuration,
            Self::SerializationError(_) | Self::TagError(_) => ErrorCategory::Data,
            Self::IoError(_) => ErrorCategory::FileSystem,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::TagError(_) => ErrorSeverity::Low,
            Self::ApiError(_) | Self::RelayError { .. } => ErrorSeverity::Medium,
            Self::HttpStatus { status, .. } if *status >= 500 => ErrorSeverity::Medium,
            Self::HttpStatus { .. }
            | Self::FlowError { .. }
            | Self::SerializationError(_)
            | Self::IoError(_) => ErrorSeverity::High,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. }
            | Self::UrlError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ApiError(_) => "Check that the API server is running and API_HOST points at it".to_string(),
            Self::HttpStatus { status: 401, .. } | Self::HttpStatus { status: 403, .. } => {
                "Refresh API_TOKEN; the server rejected the bearer token".to_string()
            }
            Self::HttpStatus { status: 404, .. } => {
                "Verify the entity ID, file name or upload ID exists on the server".to_string()
            }
            Self::HttpStatus { status, .. } if *status >= 500 => {
                "Inspect the server logs; the request reached the server but failed there".to_string()
            }
            Self::HttpStatus { .. } => "Check the request payload against the API contract".to_string(),
            Self::IoError(_) => "Check that the file exists and is readable".to_string(),
            Self::SerializationError(_) => {
                "The server returned an unexpected payload; rerun with --verbose to see it".to_string()
            }
            Self::TagError(_) => "The file's tags could not be read; metadata falls back to defaults".to_string(),
            Self::UrlError(_) => "Use a full URL such as http://localhost:38707 for API_HOST".to_string(),
            Self::MissingConfigError { field } => format!("Set {} in the environment or the config file", field),
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigValidationError { .. } => "Fix the configuration value and try again".to_string(),
            Self::RelayError { .. } => "Pick a free --proxy-port or run without the throttling relay".to_string(),
            Self::FlowError { .. } => "Review the step output above; later steps were skipped".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ApiError(e) if e.is_connect() => "Could not connect to the API server".to_string(),
            Self::ApiError(e) if e.is_timeout() => "The API request timed out".to_string(),
            Self::HttpStatus { status, url, .. } => format!("The server answered {} for {}", status, url),
            Self::MissingConfigError { field } => format!("{} is not set", field),
            other => other.to_string(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
