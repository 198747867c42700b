//! Custom error types for the common library
//!
//! This module defines the error types raised by the database and cache
//! adapters shared across services.

use redis::RedisError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// A write was rejected by a uniqueness or foreign key constraint
    #[error("Database constraint violation: {0}")]
    Constraint(String),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Classify an error returned by a query.
    ///
    /// Unique and foreign key violations become [`DatabaseError::Constraint`]
    /// so callers can tell a rejected write apart from a broken connection.
    pub fn query(err: SqlxError) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() || db_err.is_foreign_key_violation() {
                return DatabaseError::Constraint(db_err.message().to_string());
            }
        }
        DatabaseError::Query(err)
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Custom error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Error reported by the Redis client or server
    #[error("Cache error: {0}")]
    Redis(#[from] RedisError),

    /// Configuration error
    #[error("Cache configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with CacheError
pub type CacheResult<T> = Result<T, CacheError>;
