//! Proptest generators for property-based testing.

use proptest::prelude::*;

use tapticket_core::counter::{self, MAX_COUNT};
use tapticket_core::MacKey;

/// Generate valid key material (16 to 64 bytes).
pub fn mac_key() -> impl Strategy<Value = MacKey> {
    prop::collection::vec(any::<u8>(), 16..=64)
        .prop_map(|bytes| MacKey::from_bytes(bytes).expect("length in range"))
}

/// Generate a 7-byte token UID.
pub fn uid() -> impl Strategy<Value = [u8; 7]> {
    any::<[u8; 7]>()
}

/// Generate a number of allowed uses the counter can represent.
pub fn allowed_uses() -> impl Strategy<Value = u32> {
    1u32..=MAX_COUNT
}

/// Generate a consumed-uses count in the counter's domain.
pub fn consumed_uses() -> impl Strategy<Value = u32> {
    0u32..=MAX_COUNT
}

/// Generate a counter page value that is not of the form `2^n - 1`.
pub fn non_canonical_counter() -> impl Strategy<Value = u32> {
    any::<u32>().prop_filter("canonical counter", |bits| !counter::is_canonical(*bits))
}

/// Terms of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketTerms {
    pub expiry_time: u32,
    pub allowed_uses: u32,
}

impl Arbitrary for TicketTerms {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<u32>(), allowed_uses())
            .prop_map(|(expiry_time, allowed_uses)| TicketTerms {
                expiry_time,
                allowed_uses,
            })
            .boxed()
    }
}
