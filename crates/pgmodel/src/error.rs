//! Error types for pgmodel

use thiserror::Error;

/// Result type alias for pgmodel operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for statement building, execution and result binding
#[derive(Debug, Error)]
pub enum OrmError {
    /// Query execution error reported by the driver
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Column value could not be converted into the target type
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// A JSONB column payload could not be interpreted
    #[error("Type assertion failed on column '{column}': {message}")]
    TypeAssertion { column: String, message: String },

    /// A strict JSONB field could not decode its value
    #[error("Cannot decode field '{field}' from JSONB column '{column}': {message}")]
    JsonbField {
        field: String,
        column: String,
        message: String,
    },

    /// Result shape does not fit the destination type
    #[error("Invalid destination: {0}")]
    InvalidTarget(String),

    /// Statement executed without a bound connection
    #[error("No database connection bound to this statement")]
    NoConnection,

    /// Field name not registered on the record schema
    #[error("Unknown field '{field}' on table '{table}'")]
    UnknownField { table: String, field: String },

    /// Record schema violates a registration invariant
    #[error("Invalid schema for '{table}': {message}")]
    InvalidSchema { table: String, message: String },

    /// Builder state rejected before execution
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Statement timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Unit of work panicked inside a transaction
    #[error("Transaction aborted by panic: {0}")]
    Panic(String),

    /// Rollback failed after the unit of work had already failed
    #[error("{error} (rollback failed: {rollback})")]
    RollbackFailed {
        error: Box<OrmError>,
        rollback: Box<OrmError>,
    },

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an invalid destination error
    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self::InvalidTarget(message.into())
    }

    /// Combine a failed unit of work with the failure of its rollback
    pub fn rollback_failed(error: OrmError, rollback: OrmError) -> Self {
        Self::RollbackFailed {
            error: Box::new(error),
            rollback: Box::new(rollback),
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
