//! # Tapticket Testkit
//!
//! Testing utilities for tapticket.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed UID/key/terms with their expected authentication codes
//! - **Generators**: Proptest strategies for keys, UIDs, terms and counter values
//! - **Fixtures**: Pre-keyed tickets on simulated tokens
//!
//! ## Golden Vectors
//!
//! ```rust
//! use tapticket_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, code) in verify_all_vectors() {
//!     assert!(matches, "{}: {}", name, code);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use tapticket_testkit::generators::{mac_key, TicketTerms};
//!
//! proptest! {
//!     #[test]
//!     fn issued_records_verify(key in mac_key(), terms: TicketTerms) {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use tapticket_testkit::fixtures::{TestFixture, DAY, T0};
//!
//! let fixture = TestFixture::new();
//! let ticket = fixture.issued(true, T0 + 30 * DAY, 10).await;
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{init_tracing, issued_image, TestFixture, DAY, HOUR, T0, TEST_KEY};
pub use generators::TicketTerms;
pub use vectors::{all_vectors, compute_vector, verify_all_vectors, GoldenVector};
