use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during database operations
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("{driver} driver not found. {hint}")]
    DriverUnavailable { driver: String, hint: String },
    #[error("Failed to connect to database: {source}")]
    Failed {
        #[source]
        source: BoxError,
    },
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Connection is closed")]
    Closed,
}

impl ConnectionError {
    /// Wraps a driver error raised while opening a connection
    pub fn failed<E>(source: E) -> Self
    where
        E: Into<BoxError>,
    {
        ConnectionError::Failed {
            source: source.into(),
        }
    }

    pub fn query(err: impl fmt::Display) -> Self {
        ConnectionError::Query(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConnectionError>;

/// The kind of handle a release helper was asked to close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Connection,
    Statement,
    Cursor,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Connection => "connection",
            ResourceKind::Statement => "statement",
            ResourceKind::Cursor => "cursor",
        })
    }
}

/// A failure while closing a handle. Never propagated by the release helpers.
#[derive(Error, Debug)]
#[error("Error closing {kind}: {message}")]
pub struct ReleaseError {
    pub kind: ResourceKind,
    pub message: String,
}

impl ReleaseError {
    pub fn new(kind: ResourceKind, err: impl fmt::Display) -> Self {
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Errors raised while reading the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration: {source}")]
    Parse {
        #[source]
        source: java_properties::PropertiesError,
    },
}
