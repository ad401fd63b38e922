//! The ticket record held in pages 0-8.
//!
//! The authentication code covers pages 0-6 in a canonical form where the
//! lock bytes and the counter page are zero. Both of those change after a
//! ticket is issued (locking, consuming uses), and neither may invalidate it.

use crate::counter;
use crate::error::Result;
use crate::layout::{
    page_offset, MemoryImage, AUTH_CODE_PAGE, EXPIRY_PAGE, OTP_PAGE, PAGE_SIZE, TAG_PAGE,
    USES_PAGE,
};
use crate::mac::{AuthCode, RecordAuthenticator, AUTH_CODE_LEN};

/// Pages making up a record (0-8).
pub const RECORD_PAGES: u8 = 9;

/// Bytes in a record.
pub const RECORD_LEN: usize = RECORD_PAGES as usize * PAGE_SIZE;

/// Bytes covered by the authentication code (pages 0-6).
pub const SIGNED_LEN: usize = 7 * PAGE_SIZE;

/// Identity bytes: pages 0-1 plus the check and internal bytes of page 2.
const HEADER_LEN: usize = 10;

/// A ticket record as read from the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketRecord {
    /// Pages 0-1 and the first two bytes of page 2 (UID, check bytes, internal byte).
    pub header: [u8; HEADER_LEN],
    /// Lock bytes from page 2.
    pub lock_bytes: [u8; 2],
    /// Raw unary counter bits from the OTP page.
    pub counter_bits: u32,
    /// Application tag.
    pub tag: [u8; 4],
    /// Expiry time in minutes since the Unix epoch.
    pub expiry_time: u32,
    /// Total number of uses granted.
    pub allowed_uses: u32,
    /// Stored (truncated) authentication code.
    pub auth_code: AuthCode,
}

impl TicketRecord {
    /// Decode pages 0-8.
    pub fn from_bytes(bytes: &[u8; RECORD_LEN]) -> Self {
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&bytes[..HEADER_LEN]);

        let word = |page: u8| {
            let off = page_offset(page);
            [bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]]
        };

        let mut auth_code = [0u8; AUTH_CODE_LEN];
        let off = page_offset(AUTH_CODE_PAGE);
        auth_code.copy_from_slice(&bytes[off..off + AUTH_CODE_LEN]);

        Self {
            header,
            lock_bytes: [bytes[HEADER_LEN], bytes[HEADER_LEN + 1]],
            counter_bits: counter::from_page(word(OTP_PAGE)),
            tag: word(TAG_PAGE),
            expiry_time: u32::from_be_bytes(word(EXPIRY_PAGE)),
            allowed_uses: u32::from_be_bytes(word(USES_PAGE)),
            auth_code: AuthCode(auth_code),
        }
    }

    /// Decode the record from a full memory image.
    pub fn from_image(image: &MemoryImage) -> Self {
        let mut bytes = [0u8; RECORD_LEN];
        bytes.copy_from_slice(&image.as_bytes()[..RECORD_LEN]);
        Self::from_bytes(&bytes)
    }

    /// The 7-byte token identity.
    pub fn identity(&self) -> [u8; 7] {
        let h = &self.header;
        [h[0], h[1], h[2], h[4], h[5], h[6], h[7]]
    }

    /// The canonical bytes the authentication code is computed over.
    ///
    /// Lock bytes and counter are forced to zero.
    pub fn signed_bytes(&self) -> [u8; SIGNED_LEN] {
        let mut out = [0u8; SIGNED_LEN];
        out[..HEADER_LEN].copy_from_slice(&self.header);
        // bytes 10..16 stay zero: lock bytes and OTP page
        out[page_offset(TAG_PAGE)..page_offset(EXPIRY_PAGE)].copy_from_slice(&self.tag);
        out[page_offset(EXPIRY_PAGE)..page_offset(USES_PAGE)]
            .copy_from_slice(&self.expiry_time.to_be_bytes());
        out[page_offset(USES_PAGE)..SIGNED_LEN].copy_from_slice(&self.allowed_uses.to_be_bytes());
        out
    }

    /// Replace expiry and uses and recompute the authentication code.
    pub fn reissued(
        mut self,
        auth: &RecordAuthenticator,
        expiry_time: u32,
        allowed_uses: u32,
    ) -> Self {
        self.expiry_time = expiry_time;
        self.allowed_uses = allowed_uses;
        self.auth_code = auth.auth_code(&self.signed_bytes());
        self
    }

    /// Check the stored code against the canonical bytes.
    pub fn verify(&self, auth: &RecordAuthenticator) -> bool {
        auth.verify(&self.signed_bytes(), &self.auth_code)
    }

    /// Number of uses already consumed, decoded from the counter bits.
    pub fn consumed_uses(&self) -> Result<u32> {
        counter::decode(self.counter_bits)
    }

    /// Uses left after `consumed`. Never negative.
    pub fn remaining_uses(&self, consumed: u32) -> u32 {
        self.allowed_uses.saturating_sub(consumed)
    }

    /// True once `now` (minutes) is past the expiry time.
    pub fn is_expired(&self, now: u32) -> bool {
        now > self.expiry_time
    }

    /// Page 5 contents.
    pub fn expiry_page(&self) -> [u8; PAGE_SIZE] {
        self.expiry_time.to_be_bytes()
    }

    /// Page 6 contents.
    pub fn uses_page(&self) -> [u8; PAGE_SIZE] {
        self.allowed_uses.to_be_bytes()
    }
}
