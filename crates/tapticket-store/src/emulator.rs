//! Safe-mode storage emulation.
//!
//! Setting lock bits and OTP bits on a real token is permanent. In safe
//! mode the irreversible pages are emulated with ordinary storage so the
//! whole ticket lifecycle can be exercised over and over on one token:
//!
//! | Target page | Direct | Emulated |
//! |---|---|---|
//! | 2 (lock bytes) | written | write discarded |
//! | 3 (OTP) | written | redirected to page 15, OR-merged |
//! | 15 (spare) | written | write discarded |
//!
//! Reads of page 3 return page 15 in emulated mode. The mode is fixed when
//! the backend is constructed.

use async_trait::async_trait;
use tapticket_core::layout::{LOCK_PAGE, OTP_PAGE, PAGE_SIZE, SPARE_PAGE};

use crate::error::Result;
use crate::traits::{check_range, PageStore, PageStoreExt};

/// A token accessed either directly or through the safe-mode emulation.
#[derive(Debug)]
pub enum StorageBackend<S> {
    /// Every write reaches the token. Lock and OTP writes are irreversible.
    Direct(S),
    /// Lock writes are dropped and the OTP page lives in page 15.
    Emulated(S),
}

impl<S: PageStore> StorageBackend<S> {
    /// Pick the backend from a safe-mode flag.
    pub fn new(store: S, safe_mode: bool) -> Self {
        if safe_mode {
            Self::Emulated(store)
        } else {
            Self::Direct(store)
        }
    }

    /// True for the emulated variant.
    pub fn is_emulated(&self) -> bool {
        matches!(self, Self::Emulated(_))
    }

    /// The wrapped token.
    pub fn inner(&self) -> &S {
        match self {
            Self::Direct(s) | Self::Emulated(s) => s,
        }
    }

    /// Unwrap the token.
    pub fn into_inner(self) -> S {
        match self {
            Self::Direct(s) | Self::Emulated(s) => s,
        }
    }

    /// Clear the emulated counter by zeroing page 15 on the token itself.
    ///
    /// Does nothing in direct mode: a real OTP page cannot be cleared.
    pub async fn reset_emulation(&self) -> Result<()> {
        match self {
            Self::Direct(_) => Ok(()),
            Self::Emulated(s) => {
                tracing::debug!("resetting emulated counter page");
                s.write_page(SPARE_PAGE, [0u8; PAGE_SIZE]).await
            }
        }
    }
}

/// Map a page for reading in emulated mode.
fn emulated_read_page(page: u8) -> u8 {
    if page == OTP_PAGE {
        SPARE_PAGE
    } else {
        page
    }
}

#[async_trait]
impl<S: PageStore> PageStore for StorageBackend<S> {
    async fn read_pages(&self, start: u8, count: u8, dst: &mut [u8]) -> Result<()> {
        let store = match self {
            Self::Direct(s) => return s.read_pages(start, count, dst).await,
            Self::Emulated(s) => s,
        };

        check_range(start, count, dst.len())?;
        if !(start..start + count).contains(&OTP_PAGE) {
            return store.read_pages(start, count, dst).await;
        }

        for i in 0..count {
            let page = emulated_read_page(start + i);
            let off = usize::from(i) * PAGE_SIZE;
            store
                .read_pages(page, 1, &mut dst[off..off + PAGE_SIZE])
                .await?;
        }
        Ok(())
    }

    async fn write_pages(&self, src: &[u8], start: u8, count: u8) -> Result<()> {
        let store = match self {
            Self::Direct(s) => return s.write_pages(src, start, count).await,
            Self::Emulated(s) => s,
        };

        check_range(start, count, src.len())?;
        for i in 0..count {
            let page = start + i;
            let off = usize::from(i) * PAGE_SIZE;
            let chunk = &src[off..off + PAGE_SIZE];

            match page {
                LOCK_PAGE | SPARE_PAGE => {
                    tracing::trace!(page, "safe mode: discarding write");
                }
                OTP_PAGE => {
                    let mut merged = store.read_page(SPARE_PAGE).await?;
                    for (cell, bits) in merged.iter_mut().zip(chunk) {
                        *cell |= bits;
                    }
                    tracing::trace!(?merged, "safe mode: OTP write redirected to page 15");
                    store.write_page(SPARE_PAGE, merged).await?;
                }
                _ => store.write_pages(chunk, page, 1).await?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::MemoryCard;
    use tapticket_core::layout::TAG_PAGE;

    #[tokio::test]
    async fn test_direct_passes_through() {
        let backend = StorageBackend::new(MemoryCard::new(), false);
        assert!(!backend.is_emulated());

        backend.write_page(OTP_PAGE, [0, 0, 0, 1]).await.unwrap();
        backend.write_page(LOCK_PAGE, [0, 0, 0x10, 0]).await.unwrap();

        let image = backend.inner().image().unwrap();
        assert_eq!(image.page(OTP_PAGE), [0, 0, 0, 1]);
        assert!(image.is_page_locked(TAG_PAGE));
        assert!(matches!(
            backend.write_page(TAG_PAGE, *b"TIKT").await,
            Err(StoreError::PageLocked { page: 4 })
        ));
    }

    #[tokio::test]
    async fn test_emulated_discards_lock_writes() {
        let backend = StorageBackend::new(MemoryCard::new(), true);
        backend.write_page(LOCK_PAGE, [0, 0, 0xF0, 0xFF]).await.unwrap();

        let image = backend.inner().image().unwrap();
        assert!(!image.has_locks());
        backend.write_page(TAG_PAGE, *b"TIKT").await.unwrap();
    }

    #[tokio::test]
    async fn test_emulated_otp_lives_in_spare_page() {
        let backend = StorageBackend::new(MemoryCard::new(), true);
        backend.write_page(OTP_PAGE, [0, 0, 0, 0b01]).await.unwrap();
        backend.write_page(OTP_PAGE, [0, 0, 0, 0b10]).await.unwrap();

        assert_eq!(backend.read_page(OTP_PAGE).await.unwrap(), [0, 0, 0, 0b11]);

        let image = backend.inner().image().unwrap();
        assert_eq!(image.page(OTP_PAGE), [0; 4]);
        assert_eq!(image.page(SPARE_PAGE), [0, 0, 0, 0b11]);
    }

    #[tokio::test]
    async fn test_emulated_full_read_substitutes_otp() {
        let backend = StorageBackend::new(MemoryCard::new(), true);
        backend.write_page(OTP_PAGE, [0, 0, 0, 0x07]).await.unwrap();

        let image = backend.read_memory().await.unwrap();
        assert_eq!(image.page(OTP_PAGE), [0, 0, 0, 0x07]);
        assert_eq!(image.page(SPARE_PAGE), [0, 0, 0, 0x07]);
    }

    #[tokio::test]
    async fn test_emulated_spare_page_writes_discarded() {
        let backend = StorageBackend::new(MemoryCard::new(), true);
        backend.write_page(OTP_PAGE, [0, 0, 0, 1]).await.unwrap();
        backend.erase_memory().await.unwrap();

        assert_eq!(backend.read_page(OTP_PAGE).await.unwrap(), [0, 0, 0, 1]);
    }

    #[tokio::test]
    async fn test_reset_emulation() {
        let backend = StorageBackend::new(MemoryCard::new(), true);
        backend.write_page(OTP_PAGE, [0, 0, 0, 0x3F]).await.unwrap();
        backend.reset_emulation().await.unwrap();
        assert_eq!(backend.read_page(OTP_PAGE).await.unwrap(), [0; 4]);
    }

    #[tokio::test]
    async fn test_emulated_checks_range() {
        let backend = StorageBackend::new(MemoryCard::new(), true);
        let err = backend.write_pages(&[0; 4], 15, 2).await.unwrap_err();
        assert!(err.is_programming_error());
    }
}
