//! Error types for the polled sensor platforms
//!
//! Two layers live here. The fetch taxonomy ([`FetchError`] and its parts) is
//! what a single fetch cycle can end with; those errors are stored in the data
//! cache as the reason of a failed attempt and never reach the host. The
//! crate-level [`SensorError`] covers setup, configuration and I/O, and carries
//! structured error codes for logging.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, SensorError>;

/// Failure to turn a location reference into a query token
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ResolutionError {
    /// Referenced entity is not (or no longer) known to the host
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// Entity exists but neither it nor its zone carries a location
    #[error("entity has no location data: {0}")]
    NoLocationData(String),
}

/// Failure talking to the remote service
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// Remote service answered, but not with something we can read
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ParseError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Routing calculation failed
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RoutingError {
    #[error("no route found: {0}")]
    NoRouteFound(String),

    #[error("invalid routing input: {0}")]
    InvalidInput(String),
}

/// Reason a single fetch cycle failed
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", content = "error", rename_all = "snake_case")]
pub enum FetchError {
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),
}

impl FetchError {
    /// Shorthand for a transport timeout
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Transport(TransportError::Timeout(msg.into()))
    }

    /// Shorthand for a failed connection
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::Transport(TransportError::ConnectionFailed(msg.into()))
    }

    /// Shorthand for a malformed payload
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::Parse(ParseError::MalformedPayload(msg.into()))
    }

    /// Shorthand for an empty route set
    pub fn no_route<S: Into<String>>(msg: S) -> Self {
        Self::Routing(RoutingError::NoRouteFound(msg.into()))
    }

    /// Shorthand for rejected routing input
    pub fn invalid_route_input<S: Into<String>>(msg: S) -> Self {
        Self::Routing(RoutingError::InvalidInput(msg.into()))
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self, FetchError::Parse(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Transport(TransportError::Timeout(_)))
    }

    /// Map to a structured error code
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            FetchError::Resolution(ResolutionError::EntityNotFound(_)) => ErrorCode::EntityNotFound,
            FetchError::Resolution(ResolutionError::NoLocationData(_)) => ErrorCode::NoLocationData,
            FetchError::Transport(TransportError::Timeout(_)) => ErrorCode::ConnectionTimeout,
            FetchError::Transport(TransportError::ConnectionFailed(_)) => {
                ErrorCode::ConnectionRefused
            }
            FetchError::Parse(_) => ErrorCode::ParsingFailed,
            FetchError::Routing(RoutingError::NoRouteFound(_)) => ErrorCode::NoRouteFound,
            FetchError::Routing(RoutingError::InvalidInput(_)) => ErrorCode::InvalidInput,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::timeout(err.to_string())
        } else if err.is_decode() {
            FetchError::malformed(err.to_string())
        } else {
            FetchError::connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::malformed(err.to_string())
    }
}

/// Crate-level error type
#[derive(Error, Debug)]
pub enum SensorError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Platform setup was aborted
    #[error("Platform setup failed: {0}")]
    Setup(String),

    /// A fetch cycle failed where the caller asked for the error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<config::ConfigError> for SensorError {
    fn from(err: config::ConfigError) -> Self {
        SensorError::Config(err.to_string())
    }
}

impl SensorError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a setup error
    pub fn setup<S: Into<String>>(msg: S) -> Self {
        Self::Setup(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Map to structured error code
    pub fn to_error_code(&self) -> ErrorCode {
        match self {
            SensorError::Config(_) => ErrorCode::ConfigurationInvalid,
            SensorError::Setup(_) => ErrorCode::SetupFailed,
            SensorError::Fetch(err) => err.to_error_code(),
            SensorError::Http(_) => ErrorCode::ExternalServiceError,
            SensorError::Json(_) => ErrorCode::ParsingFailed,
            SensorError::Io(_) => ErrorCode::InternalError,
            SensorError::InvalidInput(_) => ErrorCode::InvalidInput,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SensorError::Config(_) | SensorError::Setup(_) => ErrorSeverity::Critical,
            SensorError::Fetch(FetchError::Transport(_)) => ErrorSeverity::Warning,
            SensorError::Fetch(_) => ErrorSeverity::Error,
            SensorError::InvalidInput(_) | SensorError::Json(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }
}

/// Structured error code for machine-readable error handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Connection errors (1000-1099)
    ConnectionTimeout,
    ConnectionRefused,

    // Configuration errors (1200-1299)
    ConfigurationInvalid,
    SetupFailed,

    // Location errors (1300-1399)
    EntityNotFound,
    NoLocationData,

    // Data errors (1400-1499)
    ParsingFailed,
    InvalidInput,

    // Service errors (1600-1699)
    ExternalServiceError,
    NoRouteFound,

    // Internal errors (1900-1999)
    InternalError,
}

impl ErrorCode {
    /// Get numeric error code
    pub fn as_number(&self) -> u32 {
        match self {
            ErrorCode::ConnectionTimeout => 1001,
            ErrorCode::ConnectionRefused => 1002,
            ErrorCode::ConfigurationInvalid => 1202,
            ErrorCode::SetupFailed => 1204,
            ErrorCode::EntityNotFound => 1301,
            ErrorCode::NoLocationData => 1302,
            ErrorCode::ParsingFailed => 1401,
            ErrorCode::InvalidInput => 1402,
            ErrorCode::ExternalServiceError => 1603,
            ErrorCode::NoRouteFound => 1605,
            ErrorCode::InternalError => 1901,
        }
    }

    /// Get error category
    pub fn category(&self) -> &'static str {
        match self.as_number() {
            1000..=1099 => "connection",
            1200..=1299 => "configuration",
            1300..=1399 => "location",
            1400..=1499 => "data",
            1600..=1699 => "service",
            1900..=1999 => "internal",
            _ => "unknown",
        }
    }
}

/// Error severity levels for logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Structured error context with additional metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Error code for machine processing
    pub code: ErrorCode,
    /// Component that generated the error
    pub component: String,
    /// Operation that was being performed
    pub operation: String,
    /// Additional metadata about the error
    pub metadata: HashMap<String, serde_json::Value>,
    /// Timestamp when error occurred
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    /// Create new error context
    pub fn new(code: ErrorCode, component: &str, operation: &str) -> Self {
        Self {
            code,
            component: component.to_string(),
            operation: operation.to_string(),
            metadata: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Add metadata to error context
    pub fn with_metadata<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Error logging utilities
pub struct ErrorReporter;

impl ErrorReporter {
    /// Log a fetch failure for a sensor. Fetch failures never escape the
    /// cycle, so this is the only trace they leave besides the error flag.
    pub fn log_fetch_failure(sensor: &str, error: &FetchError) {
        let code = error.to_error_code();
        match error {
            FetchError::Transport(_) => tracing::warn!(
                sensor = sensor,
                error_code = code.as_number(),
                category = code.category(),
                "Fetch failed: {}",
                error
            ),
            _ => tracing::error!(
                sensor = sensor,
                error_code = code.as_number(),
                category = code.category(),
                "Fetch failed: {}",
                error
            ),
        }
    }

    /// Log a crate-level error with appropriate severity
    pub fn log_error(error: &SensorError, context: Option<ErrorContext>) {
        let code = error.to_error_code();
        let context = context.unwrap_or_else(|| ErrorContext::new(code.clone(), "unknown", "unknown"));

        match error.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => tracing::error!(
                error_code = code.as_number(),
                category = code.category(),
                component = context.component,
                operation = context.operation,
                metadata = ?context.metadata,
                "Error occurred: {}",
                error
            ),
            ErrorSeverity::Warning => tracing::warn!(
                error_code = code.as_number(),
                category = code.category(),
                component = context.component,
                operation = context.operation,
                "Warning: {}",
                error
            ),
            ErrorSeverity::Info => tracing::info!(
                error_code = code.as_number(),
                category = code.category(),
                component = context.component,
                operation = context.operation,
                "Info: {}",
                error
            ),
        }
    }
}
