//! Access log errors

use thiserror::Error;

/// Errors raised while setting up the access log facility
#[derive(Debug, Error)]
pub enum AccessLogError {
    /// An explicit configuration location was given but could not be read
    #[error("access log configuration not found: {location}")]
    ConfigurationNotFound { location: String },

    /// No fallback location resolved to a readable resource
    #[error("no access log configuration available (searched: {})", .searched.join(", "))]
    NoConfigurationAvailable { searched: Vec<String> },

    /// The configuration resource exists but could not be parsed
    #[error("invalid access log configuration in {location}: {source}")]
    InvalidConfiguration {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    /// A configuration refers to an appender that was never registered
    #[error("unknown appender '{0}'")]
    UnknownAppender(String),

    /// A location string could not be interpreted
    #[error("invalid resource location '{0}'")]
    InvalidLocation(String),

    #[error("I/O error reading {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
}

impl AccessLogError {
    /// Whether the caller may fall back to running without access logging
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoConfigurationAvailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, AccessLogError>;
