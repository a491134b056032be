// Error types for the anchor-finding core.

use std::fmt;
use std::io;

/// Errors surfaced by the anchor-finding core and the persistence path.
#[derive(Debug)]
pub enum AnchorError {
    /// Empty sequence, illegal byte, or malformed cache header.
    /// Fatal to the call; the caller may retry with fixed input.
    InvalidInput(String),

    /// An array of concatenation size could not be obtained.
    Allocation(String),

    /// A persisted record violates an index invariant. Non-fatal to the
    /// session: the driver falls back to rebuilding from scratch.
    CorruptCache(String),

    /// Contract violation inside the core (overlapping anchors after
    /// chaining, inconsistent expansion). Indicates a bug.
    Internal(String),

    /// I/O error (cache file, CSV output).
    Io(io::Error),
}

impl fmt::Display for AnchorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnchorError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            AnchorError::Allocation(msg) => write!(f, "allocation failure: {}", msg),
            AnchorError::CorruptCache(msg) => write!(f, "corrupt cache: {}", msg),
            AnchorError::Internal(msg) => write!(f, "internal error: {}", msg),
            AnchorError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for AnchorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnchorError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for AnchorError {
    fn from(err: io::Error) -> Self {
        AnchorError::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, AnchorError>;
