//! # Tapticket Core
//!
//! Pure primitives for tickets stored on a 64-byte contactless token:
//! the page layout, the unary usage counter, and the record authenticator.
//!
//! This crate contains no I/O. Everything here operates on in-memory page
//! images; reading and writing the token is the job of `tapticket-store`.
//!
//! ## Key Types
//!
//! - [`TicketRecord`] - The ticket fields decoded from pages 0-8
//! - [`RecordAuthenticator`] - Keyed, truncated authentication code over a record
//! - [`MacKey`] - Pre-shared key material for the authenticator
//! - [`MemoryImage`] - A full 16-page snapshot of the token
//!
//! ## Usage Counter
//!
//! The counter in the one-time-programmable page is unary: `n` consumed uses
//! are stored as `2^n - 1`. See the [`counter`] module.

pub mod counter;
pub mod error;
pub mod layout;
pub mod mac;
pub mod record;

pub use error::{CoreError, Result};
pub use layout::{MemoryImage, APPLICATION_TAG, MEMORY_SIZE, PAGE_COUNT, PAGE_SIZE};
pub use mac::{AuthCode, MacKey, RecordAuthenticator, AUTH_CODE_LEN};
pub use record::{TicketRecord, RECORD_LEN, SIGNED_LEN};
