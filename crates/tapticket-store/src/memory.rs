//! In-memory simulated token.
//!
//! This is primarily for testing. It enforces the same write rules as the
//! chip (see [`crate::hardware`]) and can inject transport failures to
//! exercise interrupted multi-page writes.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tapticket_core::layout::{page_offset, PAGE_SIZE};
use tapticket_core::{MemoryImage, MEMORY_SIZE};

use crate::error::{Result, StoreError};
use crate::hardware::{blank_image, program_page};
use crate::traits::{check_range, PageStore};

/// UID used by [`MemoryCard::new`].
pub const DEFAULT_UID: [u8; 7] = [0x04, 0x8A, 0x1C, 0x52, 0xE2, 0x3B, 0x80];

/// In-memory token.
///
/// Thread-safe via Mutex.
pub struct MemoryCard {
    inner: Mutex<MemoryCardInner>,
}

struct MemoryCardInner {
    memory: [u8; MEMORY_SIZE],
    /// Page writes still allowed before the link "drops".
    writes_until_failure: Option<usize>,
    /// Total pages written since creation.
    pages_written: usize,
}

impl MemoryCard {
    /// A blank token with [`DEFAULT_UID`].
    pub fn new() -> Self {
        Self::with_uid(DEFAULT_UID)
    }

    /// A blank token with the given UID.
    pub fn with_uid(uid: [u8; 7]) -> Self {
        Self::from_image(MemoryImage::from_bytes(blank_image(uid)))
    }

    /// A token with arbitrary contents, bypassing write rules.
    pub fn from_image(image: MemoryImage) -> Self {
        Self {
            inner: Mutex::new(MemoryCardInner {
                memory: *image.as_bytes(),
                writes_until_failure: None,
                pages_written: 0,
            }),
        }
    }

    /// Snapshot of the current contents.
    pub fn image(&self) -> Result<MemoryImage> {
        Ok(MemoryImage::from_bytes(self.lock()?.memory))
    }

    /// Overwrite one byte, bypassing write rules. Simulates tampering.
    pub fn poke(&self, offset: usize, value: u8) -> Result<()> {
        let mut inner = self.lock()?;
        let cell = inner.memory.get_mut(offset).ok_or(StoreError::InvalidPage {
            page: u16::try_from(offset / PAGE_SIZE).unwrap_or(u16::MAX),
        })?;
        *cell = value;
        Ok(())
    }

    /// Let `n` more page writes through, then fail every transfer.
    pub fn fail_after_writes(&self, n: usize) -> Result<()> {
        self.lock()?.writes_until_failure = Some(n);
        Ok(())
    }

    /// Restore the link after [`fail_after_writes`](Self::fail_after_writes).
    pub fn reconnect(&self) -> Result<()> {
        self.lock()?.writes_until_failure = None;
        Ok(())
    }

    /// Total pages written since creation.
    pub fn pages_written(&self) -> Result<usize> {
        Ok(self.lock()?.pages_written)
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryCardInner>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Transport(format!("card state poisoned: {}", e)))
    }
}

impl Default for MemoryCard {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCardInner {
    fn link_up(&self) -> Result<()> {
        match self.writes_until_failure {
            Some(0) => Err(StoreError::Transport("token disconnected".into())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PageStore for MemoryCard {
    async fn read_pages(&self, start: u8, count: u8, dst: &mut [u8]) -> Result<()> {
        check_range(start, count, dst.len())?;
        let inner = self.lock()?;
        inner.link_up()?;

        let from = page_offset(start);
        let len = usize::from(count) * PAGE_SIZE;
        dst[..len].copy_from_slice(&inner.memory[from..from + len]);
        Ok(())
    }

    async fn write_pages(&self, src: &[u8], start: u8, count: u8) -> Result<()> {
        check_range(start, count, src.len())?;
        let mut inner = self.lock()?;

        for i in 0..count {
            inner.link_up()?;
            let page = start + i;
            let off = usize::from(i) * PAGE_SIZE;
            let mut data = [0u8; PAGE_SIZE];
            data.copy_from_slice(&src[off..off + PAGE_SIZE]);

            program_page(&mut inner.memory, page, data)?;
            inner.pages_written += 1;
            if let Some(n) = inner.writes_until_failure.as_mut() {
                *n = n.saturating_sub(1);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::PageStoreExt;
    use tapticket_core::layout::{LOCK_PAGE, OTP_PAGE, TAG_PAGE};

    #[tokio::test]
    async fn test_read_write_page() {
        let card = MemoryCard::new();
        card.write_page(TAG_PAGE, *b"TIKT").await.unwrap();
        assert_eq!(card.read_page(TAG_PAGE).await.unwrap(), *b"TIKT");
        assert_eq!(card.pages_written().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_read_with_offset_subslice() {
        let card = MemoryCard::new();
        card.write_pages(&[1, 2, 3, 4, 5, 6, 7, 8], 5, 2).await.unwrap();

        let mut buf = [0u8; 12];
        card.read_pages(5, 2, &mut buf[4..]).await.unwrap();
        assert_eq!(buf, [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn test_programming_errors() {
        let card = MemoryCard::new();
        let mut small = [0u8; 3];
        let err = card.read_pages(4, 1, &mut small).await.unwrap_err();
        assert!(err.is_programming_error());

        let err = card.write_page(16, [0; 4]).await.unwrap_err();
        assert!(err.is_programming_error());
    }

    #[tokio::test]
    async fn test_erase_memory_keeps_identity_and_otp() {
        let card = MemoryCard::new();
        card.write_page(OTP_PAGE, [0, 0, 0, 1]).await.unwrap();
        card.write_pages(&[0xEE; 48], 4, 12).await.unwrap();

        card.erase_memory().await.unwrap();
        let image = card.image().unwrap();
        assert_eq!(&image.as_bytes()[..10], &blank_image(DEFAULT_UID)[..10]);
        assert_eq!(image.page(OTP_PAGE), [0, 0, 0, 1]);
        assert!(image.as_bytes()[16..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn test_erase_fails_when_locked() {
        let card = MemoryCard::new();
        card.write_page(LOCK_PAGE, [0, 0, 0x00, 0x80]).await.unwrap();
        let err = card.erase_memory().await.unwrap_err();
        assert!(matches!(err, StoreError::PageLocked { page: 15 }));
        assert!(err.is_write_rejected());
    }

    #[tokio::test]
    async fn test_fault_injection_interrupts_multi_page_write() {
        let card = MemoryCard::new();
        card.fail_after_writes(1).unwrap();

        let err = card.write_pages(&[0xAB; 8], 5, 2).await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));

        let image = card.image().unwrap();
        assert_eq!(image.page(5), [0xAB; 4]);
        assert_eq!(image.page(6), [0; 4]);
        assert!(card.read_page(5).await.is_err());

        card.reconnect().unwrap();
        assert_eq!(card.read_page(6).await.unwrap(), [0; 4]);
    }

    #[tokio::test]
    async fn test_dump_memory() {
        let card = MemoryCard::new();
        let dump = card.dump_memory().await.unwrap();
        assert!(dump.starts_with(" 0: 04 8A 1C"));
        assert_eq!(dump.lines().count(), 16);
    }
}
