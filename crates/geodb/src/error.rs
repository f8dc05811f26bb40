//! Error types for the geodb library
//!
//! Only the control plane (`init`, snapshot loading) surfaces errors; the
//! read paths never fail: a lookup that cannot be served returns the empty
//! [`Element`](crate::Element) instead.

use thiserror::Error;

/// Main error type for geodb operations
#[derive(Error, Debug)]
pub enum GeoDbError {
    /// Bad option type or out-of-range value in the `geodb` config section
    #[error("config error: {0}")]
    Config(String),

    /// Snapshot file could not be opened, mapped or parsed
    #[error("snapshot load error: {0}")]
    SnapshotLoad(String),

    /// Error from the snapshot container decoder
    #[error(transparent)]
    Format(#[from] geodb_format::FormatError),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type alias for geodb operations
pub type Result<T> = std::result::Result<T, GeoDbError>;
