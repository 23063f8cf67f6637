//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong
/// internally. Note that an absent record is never an error: read paths
/// report it as `Ok(None)` (or an empty sequence for the cookie jar).
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The backing location could not be created or accessed.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Creating or tearing down the backing table/index failed.
    #[display("schema error")]
    Schema,
    /// Any other failure talking to the database.
    #[display("database error")]
    Database,
    /// Insert collided with an existing record for the same key.
    #[display("duplicate record: {_0}")]
    Duplicate(#[error(not(source))] String),
    /// Stored data could not be interpreted.
    #[display("invalid stored data")]
    InvalidData,
}

impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Nothing in this layer retries internally; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Whether a sqlx error is a UNIQUE constraint violation.
///
/// Used by `put`/`visited` to surface [`ErrorKind::Duplicate`] instead of a
/// generic database error. No implicit upsert happens anywhere: callers
/// either `remove` first or treat the duplicate as benign.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}
