//! # Tapticket Store
//!
//! Page-level access to the token. Provides a trait-based interface over the
//! 16 pages, simulated tokens for tests and tooling, and the safe-mode
//! backend that emulates the irreversible pages.
//!
//! ## Overview
//!
//! The protocol layer reads and writes through [`PageStore`] and never
//! assumes a particular reader. [`MemoryCard`] and [`SqliteCard`] simulate
//! the chip's write rules (read-only identity, OR-only OTP page, lock bits).
//! [`StorageBackend`] chooses between direct access and safe-mode emulation.
//!
//! ## Key Types
//!
//! - [`PageStore`] - The async trait for page transfers
//! - [`PageStoreExt`] - Single-page and whole-memory helpers
//! - [`StorageBackend`] - Direct or emulated access to a token
//! - [`MemoryCard`] - In-memory token with fault injection
//! - [`SqliteCard`] - Token image persisted in SQLite
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tapticket_store::{MemoryCard, PageStoreExt, StorageBackend};
//!
//! async fn example() {
//!     // Safe mode: lock and OTP writes never reach the real pages
//!     let backend = StorageBackend::new(MemoryCard::new(), true);
//!
//!     backend.write_page(4, *b"TIKT").await.unwrap();
//!     println!("{}", backend.dump_memory().await.unwrap());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **No atomicity**: multi-page writes can be interrupted part way
//! - **Hardware rules in one place**: both simulators share [`hardware`]
//! - **Mode is a value**: safe mode is a [`StorageBackend`] variant, not a global

pub mod emulator;
pub mod error;
pub mod hardware;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use emulator::StorageBackend;
pub use error::{Result, StoreError};
pub use memory::{MemoryCard, DEFAULT_UID};
pub use sqlite::SqliteCard;
pub use traits::{PageStore, PageStoreExt};
