//! The ticket state machine.
//!
//! A token moves through `format` -> `issue` -> `use`*, optionally `reissue`,
//! and finally `lock`. Every operation is a short sequence of page transfers
//! against one token; none of them is atomic. A write interrupted half way
//! leaves terms that no longer match the authentication code, and the next
//! `use` reports the ticket invalid.

use serde::Serialize;
use tapticket_core::counter::{self, MAX_COUNT};
use tapticket_core::layout::{
    AUTH_CODE_PAGE, AUTH_CODE_PAGES, EXPIRY_PAGE, FIRST_APP_PAGE, LOCK_ALL_APP_PAGES, LOCK_PAGE,
    OTP_PAGE, PAGE_COUNT, TAG_PAGE, USES_PAGE,
};
use tapticket_core::{MacKey, MemoryImage, RecordAuthenticator, TicketRecord, APPLICATION_TAG};
use tapticket_store::{PageStore, PageStoreExt, StorageBackend, StoreError};

use crate::config::TicketConfig;
use crate::error::{PolicyViolation, Result, TicketError};

/// Why a ticket was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// The stored authentication code does not match the record.
    Authentication,
    /// The expiry time has passed.
    Expired,
    /// No uses left.
    Exhausted,
    /// The counter page holds a pattern the counter never writes.
    CorruptedCounter,
}

/// Result of validating a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UseOutcome {
    /// Whether the ticket was (or would be) accepted.
    pub valid: bool,
    /// Uses left after this call.
    pub remaining_uses: u32,
    /// Expiry time in minutes since the Unix epoch, as stored.
    pub expiry_time: u32,
    /// Set whenever `valid` is false.
    pub reason: Option<InvalidReason>,
}

impl UseOutcome {
    fn accepted(remaining_uses: u32, expiry_time: u32) -> Self {
        Self {
            valid: true,
            remaining_uses,
            expiry_time,
            reason: None,
        }
    }

    fn refused(reason: InvalidReason, remaining_uses: u32, expiry_time: u32) -> Self {
        Self {
            valid: false,
            remaining_uses,
            expiry_time,
            reason: Some(reason),
        }
    }
}

/// Outcome of validation: either a record with a use left, or a refusal.
enum Verdict {
    Usable { consumed: u32, record: TicketRecord },
    Refused(UseOutcome),
}

/// Ticket operations on one token.
pub struct Ticket<S: PageStore> {
    backend: StorageBackend<S>,
    auth: RecordAuthenticator,
}

impl<S: PageStore> Ticket<S> {
    /// Create a ticket handle for `store`.
    ///
    /// With `safe_mode` off, `use` and `lock` write to the token permanently.
    pub fn new(store: S, key: &MacKey, safe_mode: bool) -> Result<Self> {
        let auth = RecordAuthenticator::new(key)?;
        if !safe_mode {
            tracing::warn!("safe mode disabled: counter and lock writes are permanent");
        }
        Ok(Self {
            backend: StorageBackend::new(store, safe_mode),
            auth,
        })
    }

    /// Create a ticket handle from configuration.
    pub fn from_config(store: S, config: &TicketConfig) -> Result<Self> {
        Self::new(store, &config.build_key()?, config.safe_mode)
    }

    /// The storage backend, for diagnostics.
    pub fn backend(&self) -> &StorageBackend<S> {
        &self.backend
    }

    /// The underlying token.
    pub fn store(&self) -> &S {
        self.backend.inner()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Erase the application pages and write the application tag.
    ///
    /// Fails without writing anything if any page it would erase is
    /// locked. The counter page is left as it is.
    pub async fn format(&self) -> Result<()> {
        tracing::debug!("formatting token");
        let image = self.backend.read_memory().await?;
        let locked = (FIRST_APP_PAGE..PAGE_COUNT).find(|&page| image.is_page_locked(page));
        if let Some(page) = locked {
            tracing::warn!(page, "refusing to format: page is locked");
            return Err(StoreError::PageLocked { page }.into());
        }

        self.backend.erase_memory().await?;
        self.backend.write_page(TAG_PAGE, APPLICATION_TAG).await?;

        if !self.check_format().await? {
            tracing::warn!("token did not read back as formatted");
            return Err(TicketError::FormatVerification);
        }
        Ok(())
    }

    /// True if the token is formatted and carries no ticket.
    pub async fn check_format(&self) -> Result<bool> {
        Ok(self.backend.read_memory().await?.is_formatted())
    }

    /// True if the token has the application tag and no lock bits set.
    pub async fn check_reissuability(&self) -> Result<bool> {
        Ok(self.backend.read_memory().await?.is_reissuable())
    }

    /// Write a new ticket onto a formatted token.
    ///
    /// Assumes the counter is zero, as it is right after `format` on a fresh
    /// token.
    pub async fn issue(&self, expiry_time: u32, allowed_uses: u32) -> Result<()> {
        let image = self.backend.read_memory().await?;
        if !image.is_formatted() {
            return Err(TicketError::NotFormatted);
        }

        tracing::debug!(expiry_time, allowed_uses, "issuing ticket");
        self.write_terms(&image, expiry_time, allowed_uses).await
    }

    /// Validate the ticket and, if valid, consume one use.
    pub async fn use_ticket(&self, now: u32) -> Result<UseOutcome> {
        let image = self.backend.read_memory().await?;
        let (consumed, record) = match self.evaluate(&image, now)? {
            Verdict::Refused(outcome) => return Ok(outcome),
            Verdict::Usable { consumed, record } => (consumed, record),
        };

        let bits = counter::increment_bits(consumed)?;
        self.backend
            .write_page(OTP_PAGE, counter::to_page(bits))
            .await?;

        let remaining = record.remaining_uses(consumed + 1);
        tracing::debug!(consumed = consumed + 1, remaining, "ticket used");
        Ok(UseOutcome::accepted(remaining, record.expiry_time))
    }

    /// Validate the ticket without consuming a use.
    ///
    /// `valid` says whether a `use_ticket` at `now` would succeed.
    pub async fn inspect(&self, now: u32) -> Result<UseOutcome> {
        let image = self.backend.read_memory().await?;
        Ok(match self.evaluate(&image, now)? {
            Verdict::Refused(outcome) => outcome,
            Verdict::Usable { consumed, record } => {
                UseOutcome::accepted(record.remaining_uses(consumed), record.expiry_time)
            }
        })
    }

    /// Replace the terms of an existing ticket, keeping the counter.
    ///
    /// Returns the remaining uses under the new terms.
    pub async fn reissue(&self, expiry_time: u32, allowed_uses: u32) -> Result<u32> {
        let image = self.backend.read_memory().await?;
        if !image.is_reissuable() {
            return Err(TicketError::NotReissuable);
        }

        let consumed = TicketRecord::from_image(&image).consumed_uses()?;
        if allowed_uses > MAX_COUNT {
            tracing::warn!(allowed_uses, "reissue rejected: too many uses");
            return Err(PolicyViolation::TooManyUses {
                requested: allowed_uses,
                max: MAX_COUNT,
            }
            .into());
        }
        if allowed_uses < consumed {
            tracing::warn!(allowed_uses, consumed, "reissue rejected: below consumed");
            return Err(PolicyViolation::BelowConsumed {
                requested: allowed_uses,
                consumed,
            }
            .into());
        }

        tracing::debug!(expiry_time, allowed_uses, consumed, "reissuing ticket");
        self.write_terms(&image, expiry_time, allowed_uses).await?;
        Ok(allowed_uses - consumed)
    }

    /// Permanently write-protect pages 4-15.
    ///
    /// In safe mode the lock write is discarded.
    pub async fn lock(&self) -> Result<()> {
        tracing::debug!(emulated = self.backend.is_emulated(), "locking token");
        let [lock0, lock1] = LOCK_ALL_APP_PAGES;
        self.backend
            .write_page(LOCK_PAGE, [0, 0, lock0, lock1])
            .await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Write expiry, uses and authentication code as three separate transfers.
    async fn write_terms(
        &self,
        image: &MemoryImage,
        expiry_time: u32,
        allowed_uses: u32,
    ) -> Result<()> {
        let record = TicketRecord::from_image(image).reissued(&self.auth, expiry_time, allowed_uses);

        self.backend
            .write_page(EXPIRY_PAGE, record.expiry_page())
            .await?;
        self.backend
            .write_page(USES_PAGE, record.uses_page())
            .await?;
        self.backend
            .write_pages(record.auth_code.as_bytes(), AUTH_CODE_PAGE, AUTH_CODE_PAGES)
            .await?;
        Ok(())
    }

    /// Run the validation pipeline over a memory image.
    ///
    /// Order: not issued, authentication, counter, expiry, exhaustion.
    fn evaluate(&self, image: &MemoryImage, now: u32) -> Result<Verdict> {
        if image.is_formatted() {
            return Err(TicketError::NotIssued);
        }

        let record = TicketRecord::from_image(image);
        let expiry = record.expiry_time;

        let consumed = record.consumed_uses();
        let remaining = consumed
            .as_ref()
            .map_or(0, |&n| record.remaining_uses(n));

        if !record.verify(&self.auth) {
            tracing::warn!("ticket authentication failed");
            return Ok(Verdict::Refused(UseOutcome::refused(
                InvalidReason::Authentication,
                remaining,
                expiry,
            )));
        }

        let consumed = match consumed {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "ticket counter corrupted");
                return Ok(Verdict::Refused(UseOutcome::refused(
                    InvalidReason::CorruptedCounter,
                    0,
                    expiry,
                )));
            }
        };

        if record.is_expired(now) {
            tracing::debug!(now, expiry, "ticket expired");
            return Ok(Verdict::Refused(UseOutcome::refused(
                InvalidReason::Expired,
                remaining,
                expiry,
            )));
        }

        if remaining < 1 || consumed >= MAX_COUNT {
            tracing::debug!(consumed, "ticket exhausted");
            return Ok(Verdict::Refused(UseOutcome::refused(
                InvalidReason::Exhausted,
                remaining,
                expiry,
            )));
        }

        Ok(Verdict::Usable { consumed, record })
    }
}

/// Minutes since the Unix epoch, the unit of `expiry_time`.
pub fn now_minutes() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let minutes = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() / 60)
        .unwrap_or(0);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}
