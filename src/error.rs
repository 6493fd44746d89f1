//! Error types for index construction and queries.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the trees, forests and linear scans.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The dataset handed to a constructor was unusable (e.g. empty).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A parameter was out of range for the index it was given to.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A point was expected to be part of the dataset but is not.
    #[error("point not found in dataset")]
    NotFound,
}

impl Error {
    /// Creates a new `InvalidInput` error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a new `InvalidArgument` error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
