//! Error types for the index engine.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::ProfileId;

/// Result type for engine operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors raised by [`FaceIndex`](crate::FaceIndex) operations.
///
/// Logical conflicts (an id already enrolled, an id that is not enrolled) are
/// not errors: the engine reports them as `Ok(false)`.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The caller supplied something the engine refuses to coerce.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The structure and identity map disagree. Always a bug.
    #[error("Index inconsistent: {0}")]
    Inconsistent(String),
}

impl IndexError {
    /// Embedding length differs from the engine dimension.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::InvalidInput(format!(
            "Embedding dimension mismatch: expected {expected}, got {actual}"
        ))
    }
}

/// Violations of the identity map's bijection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Face profile {0} is already bound")]
    DuplicateIdentity(ProfileId),

    #[error("Face profile {0} is not bound")]
    NotFound(ProfileId),

    #[error("Position {position} is out of order, next dense position is {expected}")]
    PositionOutOfOrder { position: usize, expected: usize },
}

/// Problems decoding a persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("invalid magic bytes")]
    InvalidMagic,

    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("snapshot truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("snapshot length mismatch: header implies {expected} bytes, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("snapshot maps face profile {0} twice")]
    DuplicateIdentity(ProfileId),

    #[error("snapshot holds {found}-dimensional vectors, index expects {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("snapshot id table is inconsistent: {0}")]
    Inconsistent(String),

    #[error("{field} of {value} does not fit the snapshot header")]
    HeaderOverflow { field: &'static str, value: usize },
}

/// Failures of the durable snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot store timed out after {0:?}")]
    Timeout(Duration),

    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),

    #[error("Path has no parent directory: {0}")]
    NoParentDir(PathBuf),
}
