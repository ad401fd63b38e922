//! Write semantics of the physical token.
//!
//! Shared by every simulated token so they all refuse and merge writes the
//! same way the chip does:
//!
//! - pages 0-1 are read-only;
//! - page 2 ignores bytes 0-1 and ORs bytes 2-3 into the lock bytes;
//! - page 3 (OTP) ORs the written bits in, and is refused once locked;
//! - pages 4-15 are overwritten, and refused once their lock bit is set.
//!
//! Block-locking bits (lock byte 0, bits 0-2) are stored but not enforced.

use tapticket_core::layout::{
    lock_bit, page_offset, LOCK_BYTE_OFFSET, LOCK_PAGE, OTP_PAGE, PAGE_SIZE,
};
use tapticket_core::{MemoryImage, MEMORY_SIZE};

use crate::error::{Result, StoreError};

/// Check byte seeded into page 0 byte 3 (cascade tag).
const CASCADE_TAG: u8 = 0x88;

/// Apply a single-page write to `memory` as the token would.
pub fn program_page(
    memory: &mut [u8; MEMORY_SIZE],
    page: u8,
    data: [u8; PAGE_SIZE],
) -> Result<()> {
    let image = MemoryImage::from_bytes(*memory);
    let off = page_offset(page);

    match page {
        0 | 1 => Err(StoreError::PageReadOnly { page }),
        LOCK_PAGE => {
            memory[LOCK_BYTE_OFFSET] |= data[2];
            memory[LOCK_BYTE_OFFSET + 1] |= data[3];
            Ok(())
        }
        _ if image.is_page_locked(page) => Err(StoreError::PageLocked { page }),
        OTP_PAGE => {
            for (cell, bits) in memory[off..off + PAGE_SIZE].iter_mut().zip(data) {
                *cell |= bits;
            }
            Ok(())
        }
        _ if lock_bit(page).is_some() => {
            memory[off..off + PAGE_SIZE].copy_from_slice(&data);
            Ok(())
        }
        _ => Err(StoreError::InvalidPage {
            page: u16::from(page),
        }),
    }
}

/// A factory-fresh token image for the given 7-byte UID.
///
/// Pages 0-2 carry the UID with its two check bytes; everything else is zero.
pub fn blank_image(uid: [u8; 7]) -> [u8; MEMORY_SIZE] {
    let mut memory = [0u8; MEMORY_SIZE];
    let bcc0 = CASCADE_TAG ^ uid[0] ^ uid[1] ^ uid[2];
    let bcc1 = uid[3] ^ uid[4] ^ uid[5] ^ uid[6];
    memory[..4].copy_from_slice(&[uid[0], uid[1], uid[2], bcc0]);
    memory[4..8].copy_from_slice(&uid[3..]);
    memory[8] = bcc1;
    memory[9] = 0x48;
    memory
}
