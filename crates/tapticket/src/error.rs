//! Error types for ticket operations.

use tapticket_core::CoreError;
use tapticket_store::StoreError;
use thiserror::Error;

/// Errors that can occur during ticket operations.
///
/// Authentication failures and expired or exhausted tickets are not errors:
/// [`Ticket::use_ticket`](crate::Ticket::use_ticket) reports them in its
/// [`UseOutcome`](crate::UseOutcome).
#[derive(Debug, Error)]
pub enum TicketError {
    /// Storage error: transport failure, refused write, or a bad page range.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Core error: bad key material or a corrupted counter.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The token does not carry a freshly formatted layout.
    #[error("token is not formatted")]
    NotFormatted,

    /// Reading back after `format` did not show a formatted token.
    #[error("format verification failed")]
    FormatVerification,

    /// Wrong application tag, or lock bits are set.
    #[error("token cannot be reissued")]
    NotReissuable,

    /// The token is formatted but no ticket was ever issued on it.
    #[error("no ticket issued")]
    NotIssued,

    /// Requested terms are outside what the token can represent.
    #[error("policy violation: {0}")]
    Policy(#[from] PolicyViolation),

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Reissue terms the token cannot honour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    /// More uses than the counter can count.
    #[error("{requested} uses exceeds the counter limit of {max}")]
    TooManyUses { requested: u32, max: u32 },

    /// Fewer uses than have already been consumed.
    #[error("{requested} uses is below the {consumed} already consumed")]
    BelowConsumed { requested: u32, consumed: u32 },
}

impl TicketError {
    /// True for errors caused by a defect in the calling code.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, TicketError::Store(e) if e.is_programming_error())
    }

    /// True if the token refused a write, e.g. because it is locked.
    pub fn is_write_rejected(&self) -> bool {
        matches!(self, TicketError::Store(e) if e.is_write_rejected())
    }
}

/// Result type for ticket operations.
pub type Result<T> = std::result::Result<T, TicketError>;
