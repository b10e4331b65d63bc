use thiserror::Error;
use tokio::task::JoinError;

/// Errors related to loading, classifying and publishing the tree.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal storage error: {0}")]
    StorageError(String),

    #[error("inconsistent tree: {0}")]
    Structure(#[from] StructureError),

    #[error("unable to build context index: {0}")]
    Index(#[from] IndexError),
}

/// The row set returned by the store does not form a single tree.
/// This indicates corrupted data in the store, not a transient failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructureError {
    #[error("no root row found")]
    MissingRoot,

    #[error("duplicate root detected: {first} and {second}")]
    DuplicateRoot { first: String, second: String },

    #[error("duplicate id {0}")]
    DuplicateId(i64),

    #[error("parent {parent_id} of {path} not found")]
    ParentNotFound { path: String, parent_id: i64 },

    #[error("{parent} has more than one child named {name:?}")]
    DuplicateChild { parent: String, name: String },

    #[error("{0} is not reachable from the root")]
    Unreachable(String),

    #[error("path {path} does not match its ancestors, expected {expected}")]
    PathMismatch { path: String, expected: String },
}

/// A context index (datacenters, groups, services) could not be read from
/// the tree.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("{path}: invalid network {network:?}: {reason}")]
    InvalidNetwork {
        path: String,
        network: String,
        reason: String,
    },

    #[error("{path}: invalid host pattern {pattern:?}: {reason}")]
    InvalidPattern {
        path: String,
        pattern: String,
        reason: String,
    },

    #[error(transparent)]
    Symlink(#[from] SymlinkError),
}

/// A symlink could not be followed to a non-symlink node.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymlinkError {
    #[error("symlink cycle at {0}")]
    Cycle(String),

    #[error("{path}: symlink target {target:?} not found")]
    Dangling { path: String, target: String },
}

impl From<JoinError> for Error {
    fn from(value: JoinError) -> Self {
        Error::StorageError(value.to_string())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Error::StorageError(value.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        if value.kind() == std::io::ErrorKind::InvalidInput {
            Error::InvalidRequest(value.to_string())
        } else {
            Error::StorageError(value.to_string())
        }
    }
}
