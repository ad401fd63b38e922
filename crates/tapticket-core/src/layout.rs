//! Page layout of the token.
//!
//! The token has 16 pages of 4 bytes. Pages 0-1 and the first two bytes of
//! page 2 hold the read-only identity; the last two bytes of page 2 are the
//! lock bytes; page 3 is one-time-programmable; pages 4-15 belong to the
//! application.
//!
//! ```text
//! page  0-1   identity (read-only)
//! page  2     check byte, internal byte, lock byte 0, lock byte 1
//! page  3     OTP usage counter
//! page  4     application tag
//! page  5     expiry time (minutes, big-endian)
//! page  6     allowed uses (big-endian)
//! page  7-8   authentication code
//! page  15    spare, used by safe-mode emulation
//! ```

use std::fmt;

/// Bytes per page.
pub const PAGE_SIZE: usize = 4;

/// Number of pages on the token.
pub const PAGE_COUNT: u8 = 16;

/// Total memory size in bytes.
pub const MEMORY_SIZE: usize = PAGE_SIZE * PAGE_COUNT as usize;

/// Page holding the identity check byte, internal byte and lock bytes.
pub const LOCK_PAGE: u8 = 2;

/// One-time-programmable page holding the usage counter.
pub const OTP_PAGE: u8 = 3;

/// First page writable by the application.
pub const FIRST_APP_PAGE: u8 = 4;

/// Page holding the application tag.
pub const TAG_PAGE: u8 = 4;

/// Page holding the expiry time.
pub const EXPIRY_PAGE: u8 = 5;

/// Page holding the number of allowed uses.
pub const USES_PAGE: u8 = 6;

/// First page of the authentication code.
pub const AUTH_CODE_PAGE: u8 = 7;

/// Number of pages the authentication code occupies.
pub const AUTH_CODE_PAGES: u8 = 2;

/// Spare page standing in for the OTP page in safe mode.
pub const SPARE_PAGE: u8 = 15;

/// Pages that must be zero on a freshly formatted token (5..=14).
///
/// Page 15 is excluded because safe mode keeps the emulated counter there.
pub const ZEROED_PAGES: std::ops::RangeInclusive<u8> = 5..=14;

/// Constant written to the tag page by `format`.
pub const APPLICATION_TAG: [u8; 4] = *b"TIKT";

/// Lock bytes that write-protect every application page (4-15).
///
/// Lock byte 0 bits 4-7 cover pages 4-7; lock byte 1 bits 0-7 cover pages 8-15.
pub const LOCK_ALL_APP_PAGES: [u8; 2] = [0xF0, 0xFF];

/// Byte offset of the first lock byte in memory.
pub const LOCK_BYTE_OFFSET: usize = LOCK_PAGE as usize * PAGE_SIZE + 2;

/// Byte offset of `page` in a memory image.
pub const fn page_offset(page: u8) -> usize {
    page as usize * PAGE_SIZE
}

/// The lock bit guarding `page`, as `(lock byte index, mask)`.
///
/// Returns `None` for pages 0-2, which have no lock bit of their own.
pub const fn lock_bit(page: u8) -> Option<(usize, u8)> {
    match page {
        3 => Some((0, 0x08)),
        4..=7 => Some((0, 1 << page)),
        8..=15 => Some((1, 1 << (page - 8))),
        _ => None,
    }
}

/// A complete 64-byte snapshot of token memory.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MemoryImage(pub [u8; MEMORY_SIZE]);

impl MemoryImage {
    /// An all-zero image.
    pub const ZERO: Self = Self([0u8; MEMORY_SIZE]);

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; MEMORY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; MEMORY_SIZE] {
        &self.0
    }

    /// Read one page. Panics if `page` is not below [`PAGE_COUNT`].
    pub fn page(&self, page: u8) -> [u8; PAGE_SIZE] {
        let off = page_offset(page);
        let mut out = [0u8; PAGE_SIZE];
        out.copy_from_slice(&self.0[off..off + PAGE_SIZE]);
        out
    }

    /// The two lock bytes from page 2.
    pub fn lock_bytes(&self) -> [u8; 2] {
        [self.0[LOCK_BYTE_OFFSET], self.0[LOCK_BYTE_OFFSET + 1]]
    }

    /// True if any lock bit at all is set.
    pub fn has_locks(&self) -> bool {
        self.lock_bytes() != [0, 0]
    }

    /// True if the lock bit guarding `page` is set.
    pub fn is_page_locked(&self, page: u8) -> bool {
        match lock_bit(page) {
            Some((byte, mask)) => self.lock_bytes()[byte] & mask != 0,
            None => false,
        }
    }

    /// The application tag page.
    pub fn tag(&self) -> [u8; PAGE_SIZE] {
        self.page(TAG_PAGE)
    }

    /// True if pages 5..=14 are all zero.
    pub fn data_pages_zeroed(&self) -> bool {
        let start = page_offset(*ZEROED_PAGES.start());
        let end = page_offset(*ZEROED_PAGES.end()) + PAGE_SIZE;
        self.0[start..end].iter().all(|&b| b == 0)
    }

    /// Tag matches, data pages are zero and no lock bit is set.
    pub fn is_formatted(&self) -> bool {
        self.tag() == APPLICATION_TAG && self.data_pages_zeroed() && !self.has_locks()
    }

    /// Tag matches and no lock bit is set. Data pages may hold a ticket.
    pub fn is_reissuable(&self) -> bool {
        self.tag() == APPLICATION_TAG && !self.has_locks()
    }
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self::ZERO
    }
}

impl AsRef<[u8]> for MemoryImage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; MEMORY_SIZE]> for MemoryImage {
    fn from(bytes: [u8; MEMORY_SIZE]) -> Self {
        Self(bytes)
    }
}

/// Hex dump, one page per line.
impl fmt::Display for MemoryImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for page in 0..PAGE_COUNT {
            let bytes = self.page(page);
            writeln!(
                f,
                "{:2}: {:02X} {:02X} {:02X} {:02X}",
                page, bytes[0], bytes[1], bytes[2], bytes[3]
            )?;
        }
        Ok(())
    }
}

impl fmt::Debug for MemoryImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryImage({})", hex::encode(self.0))
    }
}
