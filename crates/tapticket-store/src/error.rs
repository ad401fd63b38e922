//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur reading or writing token pages.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Page address outside 0..16.
    #[error("invalid page address {page}: pages are 0..=15")]
    InvalidPage { page: u16 },

    /// Buffer smaller than the pages being transferred.
    #[error("buffer too short: need {needed} bytes, got {got}")]
    BufferTooShort { needed: usize, got: usize },

    /// Write to a page the token never allows writing (identity pages).
    #[error("page {page} is read-only")]
    PageReadOnly { page: u8 },

    /// Write to a page whose lock bit is set.
    #[error("page {page} is locked")]
    PageLocked { page: u8 },

    /// The reader or the link to the token failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Stored token image is malformed.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// True for errors caused by a defect in the calling code, not the token.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidPage { .. } | StoreError::BufferTooShort { .. }
        )
    }

    /// True if the token refused the write.
    pub fn is_write_rejected(&self) -> bool {
        matches!(
            self,
            StoreError::PageReadOnly { .. } | StoreError::PageLocked { .. }
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
