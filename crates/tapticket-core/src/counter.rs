//! Unary usage counter.
//!
//! The OTP page can only set bits, never clear them. A count `n` is stored as
//! the `n` least-significant bits set (`2^n - 1`), so going from `n` to `n + 1`
//! only ever sets one more bit and the stored value still orders by magnitude.
//!
//! Decoding is strict: any pattern that is not `2^n - 1` is treated as
//! corruption and rejected.

use crate::error::{CoreError, Result};

/// Largest count the 32-bit page can hold.
pub const MAX_COUNT: u32 = 32;

/// Encode `n` consumed uses as `2^n - 1`.
pub fn encode(n: u32) -> Result<u32> {
    match n {
        0..=31 => Ok((1u32 << n) - 1),
        MAX_COUNT => Ok(u32::MAX),
        _ => Err(CoreError::CounterOutOfRange(n)),
    }
}

/// Decode a counter page back to the number of consumed uses.
///
/// Fails with [`CoreError::NonCanonicalCounter`] unless `bits == 2^n - 1`.
pub fn decode(bits: u32) -> Result<u32> {
    if is_canonical(bits) {
        Ok(bits.trailing_ones())
    } else {
        Err(CoreError::NonCanonicalCounter(bits))
    }
}

/// True if `bits` is a contiguous run of ones starting at bit 0.
pub const fn is_canonical(bits: u32) -> bool {
    bits & bits.wrapping_add(1) == 0
}

/// The bits to OR onto the page to advance the count from `n` to `n + 1`.
///
/// This is the single newly set bit; the low `n` bits are already on the
/// page and are not rewritten.
pub fn increment_bits(n: u32) -> Result<u32> {
    let next = n.checked_add(1).ok_or(CoreError::CounterOutOfRange(n))?;
    Ok(encode(next)? & !encode(n)?)
}

/// Counter page bytes as stored on the token (big-endian).
pub const fn to_page(bits: u32) -> [u8; 4] {
    bits.to_be_bytes()
}

/// Counter value from the page bytes.
pub const fn from_page(page: [u8; 4]) -> u32 {
    u32::from_be_bytes(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_bounds() {
        assert_eq!(encode(0).unwrap(), 0);
        assert_eq!(encode(1).unwrap(), 0b1);
        assert_eq!(encode(5).unwrap(), 0b1_1111);
        assert_eq!(encode(31).unwrap(), 0x7FFF_FFFF);
        assert_eq!(encode(32).unwrap(), 0xFFFF_FFFF);
        assert_eq!(encode(33), Err(CoreError::CounterOutOfRange(33)));
    }

    #[test]
    fn test_decode_rejects_non_canonical() {
        for bits in [0b10, 0b101, 0b110, 0x8000_0000, 0xFFFF_FFFE, 0x0F0F_0F0F] {
            assert_eq!(decode(bits), Err(CoreError::NonCanonicalCounter(bits)));
        }
    }

    #[test]
    fn test_decode_full_page() {
        assert_eq!(decode(u32::MAX).unwrap(), 32);
    }

    #[test]
    fn test_increment_sets_one_new_bit() {
        assert_eq!(increment_bits(0).unwrap(), 0b1);
        assert_eq!(increment_bits(3).unwrap(), 0b1000);
        assert_eq!(increment_bits(31).unwrap(), 0x8000_0000);
        assert!(increment_bits(32).is_err());
    }

    #[test]
    fn test_page_byte_order() {
        // Low bits land in the last byte of the page.
        assert_eq!(to_page(encode(3).unwrap()), [0, 0, 0, 0x07]);
        assert_eq!(from_page([0, 0, 0x01, 0xFF]), 0x1FF);
    }

    proptest! {
        #[test]
        fn test_decode_inverts_encode(n in 0u32..=MAX_COUNT) {
            prop_assert_eq!(decode(encode(n).unwrap()).unwrap(), n);
        }

        #[test]
        fn test_encode_is_or_monotonic(n in 0u32..MAX_COUNT) {
            let low = encode(n).unwrap();
            let high = encode(n + 1).unwrap();
            prop_assert_eq!(low & high, low);
            prop_assert_eq!(low | increment_bits(n).unwrap(), high);
        }

        #[test]
        fn test_canonical_iff_decodable(bits in any::<u32>()) {
            let decoded = decode(bits);
            prop_assert_eq!(decoded.is_ok(), is_canonical(bits));
            if let Ok(n) = decoded {
                prop_assert_eq!(encode(n).unwrap(), bits);
            }
        }
    }
}
