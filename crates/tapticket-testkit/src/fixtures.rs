//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use tapticket::{MacKey, Ticket};
use tapticket_core::layout::{page_offset, AUTH_CODE_PAGE, EXPIRY_PAGE, TAG_PAGE, USES_PAGE};
use tapticket_core::{MemoryImage, RecordAuthenticator, TicketRecord, APPLICATION_TAG};
use tapticket_store::hardware::blank_image;
use tapticket_store::{MemoryCard, DEFAULT_UID};

/// Key used by [`TestFixture::new`].
pub const TEST_KEY: [u8; 32] = [0x5A; 32];

/// A fixed "now" for tests, in minutes since the Unix epoch (2025-02-19).
pub const T0: u32 = 29_000_000;

/// Minutes in an hour.
pub const HOUR: u32 = 60;

/// Minutes in a day.
pub const DAY: u32 = 24 * HOUR;

/// A test fixture with a key and a token UID.
pub struct TestFixture {
    pub key: MacKey,
    pub uid: [u8; 7],
}

impl TestFixture {
    /// Create a fixture with [`TEST_KEY`] and the default UID.
    pub fn new() -> Self {
        Self::with_key_byte(TEST_KEY[0])
    }

    /// Create with a deterministic key filled with `byte`.
    pub fn with_key_byte(byte: u8) -> Self {
        Self {
            key: MacKey::from_bytes([byte; 32]).expect("32-byte key"),
            uid: DEFAULT_UID,
        }
    }

    /// Create with a fresh random key.
    pub fn random() -> Self {
        Self {
            key: MacKey::generate(),
            uid: DEFAULT_UID,
        }
    }

    /// A blank token carrying this fixture's UID.
    pub fn card(&self) -> MemoryCard {
        MemoryCard::with_uid(self.uid)
    }

    /// A ticket handle on a blank token in safe mode.
    pub fn safe_ticket(&self) -> Ticket<MemoryCard> {
        self.ticket_on(self.card(), true)
    }

    /// A ticket handle on a blank token writing the real OTP and lock pages.
    pub fn direct_ticket(&self) -> Ticket<MemoryCard> {
        self.ticket_on(self.card(), false)
    }

    /// A ticket handle on an arbitrary token.
    pub fn ticket_on(&self, card: MemoryCard, safe_mode: bool) -> Ticket<MemoryCard> {
        Ticket::new(card, &self.key, safe_mode).expect("valid test key")
    }

    /// Format a blank token and issue a ticket on it.
    pub async fn issued(
        &self,
        safe_mode: bool,
        expiry_time: u32,
        allowed_uses: u32,
    ) -> Ticket<MemoryCard> {
        let ticket = self.ticket_on(self.card(), safe_mode);
        ticket.format().await.expect("format blank token");
        ticket
            .issue(expiry_time, allowed_uses)
            .await
            .expect("issue on formatted token");
        ticket
    }

    /// The memory image an issue with these terms produces, computed offline.
    pub fn issued_image(&self, expiry_time: u32, allowed_uses: u32) -> MemoryImage {
        issued_image(self.uid, &self.key, expiry_time, allowed_uses)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the image of a freshly issued token without going through a store.
pub fn issued_image(
    uid: [u8; 7],
    key: &MacKey,
    expiry_time: u32,
    allowed_uses: u32,
) -> MemoryImage {
    let mut bytes = blank_image(uid);
    let tag = page_offset(TAG_PAGE);
    bytes[tag..tag + 4].copy_from_slice(&APPLICATION_TAG);

    let auth = RecordAuthenticator::new(key).expect("valid test key");
    let record = TicketRecord::from_image(&MemoryImage::from_bytes(bytes))
        .reissued(&auth, expiry_time, allowed_uses);

    let exp = page_offset(EXPIRY_PAGE);
    bytes[exp..exp + 4].copy_from_slice(&record.expiry_page());
    let uses = page_offset(USES_PAGE);
    bytes[uses..uses + 4].copy_from_slice(&record.uses_page());
    let code = page_offset(AUTH_CODE_PAGE);
    bytes[code..code + 8].copy_from_slice(record.auth_code.as_bytes());
    MemoryImage::from_bytes(bytes)
}

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}
