//! # Tapticket
//!
//! Time- and usage-limited tickets on a 16-page contactless token.
//!
//! ## Overview
//!
//! A ticket is an expiry time and a number of allowed uses written to the
//! token's application pages, protected by a truncated authentication code
//! under a pre-shared key. Consumed uses are counted in the token's
//! one-time-programmable page, which can only ever gain set bits, so a
//! ticket cannot be "refilled" by rewriting memory.
//!
//! ## Key Concepts
//!
//! - **Format**: tag the token and zero its data pages.
//! - **Issue / Reissue**: write new terms and their authentication code.
//! - **Use**: verify, check expiry and remaining uses, and set one counter bit.
//! - **Lock**: permanently write-protect the application pages.
//! - **Safe mode**: emulate the counter and lock pages so nothing is permanent.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tapticket::{now_minutes, Ticket, TicketConfig};
//! use tapticket::store::MemoryCard;
//!
//! async fn example() {
//!     let config = TicketConfig::from_env().unwrap();
//!     let ticket = Ticket::from_config(MemoryCard::new(), &config).unwrap();
//!
//!     ticket.format().await.unwrap();
//!     ticket.issue(now_minutes() + 30 * 24 * 60, 10).await.unwrap();
//!
//!     let outcome = ticket.use_ticket(now_minutes()).await.unwrap();
//!     assert!(outcome.valid);
//!     assert_eq!(outcome.remaining_uses, 9);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `tapticket::core` - Layout, counter and authenticator primitives
//! - `tapticket::store` - Page storage, simulated tokens and safe mode

pub mod config;
pub mod error;
pub mod ticket;

// Re-export component crates
pub use tapticket_core as core;
pub use tapticket_store as store;

// Re-export main types for convenience
pub use config::{KeySource, TicketConfig};
pub use error::{PolicyViolation, Result, TicketError};
pub use ticket::{now_minutes, InvalidReason, Ticket, UseOutcome};

pub use tapticket_core::{MacKey, MemoryImage};
pub use tapticket_store::{PageStore, PageStoreExt, StorageBackend};
