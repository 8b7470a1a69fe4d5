//! Capability error types.

use thiserror::Error;

/// Capability errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A capability name not in the known set was requested.
    #[error("unknown capability: {0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, Error>;
