//! Error types for catalog operations.

use thiserror::Error;

/// Errors that can occur while defining, opening or querying a catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The key schema is malformed (reserved, duplicate or invalid name).
    #[error("invalid key schema: {0}")]
    Schema(String),

    /// The keys given for a dataset do not match the schema.
    #[error("key mismatch: {0}")]
    KeyMismatch(String),

    /// A filter names a key the schema does not define.
    #[error("unknown key '{0}'")]
    UnknownKey(String),

    /// The stored catalog version cannot be served by this engine.
    #[error("catalog version {found} is incompatible with engine version {expected}")]
    IncompatibleVersion { found: String, expected: String },

    /// `create` was called on a location that already holds a catalog.
    #[error("catalog already initialized at {0}")]
    AlreadyInitialized(String),

    /// The location does not hold a readable catalog.
    #[error("invalid catalog: {0}")]
    InvalidDatabase(String),

    /// Malformed `page` / `limit` combination.
    #[error("invalid pagination: {0}")]
    InvalidPagination(String),

    /// The catalog URL could not be understood.
    #[error("invalid catalog url: {0}")]
    InvalidUrl(String),

    /// A supplied metadata record violates its invariants.
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// A version migration was refused.
    #[error("migration refused: {0}")]
    Migration(String),

    /// Backing store failure, passed through unchanged.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// JSON column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CatalogError {
    /// Create a Schema error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a KeyMismatch error.
    pub fn key_mismatch(msg: impl Into<String>) -> Self {
        Self::KeyMismatch(msg.into())
    }

    /// Create an InvalidDatabase error.
    pub fn invalid_database(msg: impl Into<String>) -> Self {
        Self::InvalidDatabase(msg.into())
    }

    /// Create an InvalidPagination error.
    pub fn invalid_pagination(msg: impl Into<String>) -> Self {
        Self::InvalidPagination(msg.into())
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
