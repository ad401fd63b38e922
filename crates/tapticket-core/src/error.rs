//! Error types for the Tapticket Core.

use thiserror::Error;

/// Errors raised by the pure ticket primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Key material is unusable (empty, too short, or not valid hex).
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// The counter page holds a pattern that is not of the form `2^n - 1`.
    #[error("usage counter is not canonical: {0:#010x}")]
    NonCanonicalCounter(u32),

    /// A use count outside the 32-bit counter domain.
    #[error("use count {0} is outside the counter domain 0..=32")]
    CounterOutOfRange(u32),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
