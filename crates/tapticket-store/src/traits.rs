//! PageStore trait: the abstract interface to token memory.
//!
//! The protocol layer only ever talks to this trait. Implementations include
//! simulated tokens (in-memory and SQLite) and the safe-mode backend that
//! wraps any of them.

use async_trait::async_trait;
use tapticket_core::layout::{FIRST_APP_PAGE, PAGE_COUNT, PAGE_SIZE};
use tapticket_core::MemoryImage;
use tapticket_core::MEMORY_SIZE;

use crate::error::{Result, StoreError};

/// Page-addressed access to a 16-page token.
///
/// Transfers are whole pages. `dst`/`src` must hold at least
/// `count * PAGE_SIZE` bytes; callers wanting an offset pass a subslice.
///
/// # Design Notes
///
/// - **No atomicity**: a multi-page write stops at the first failing page;
///   pages before it stay written.
/// - **Programming errors**: out-of-range pages and short buffers return
///   [`StoreError::InvalidPage`] / [`StoreError::BufferTooShort`].
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Read `count` pages starting at `start` into `dst`.
    async fn read_pages(&self, start: u8, count: u8, dst: &mut [u8]) -> Result<()>;

    /// Write `count` pages from `src` starting at `start`.
    async fn write_pages(&self, src: &[u8], start: u8, count: u8) -> Result<()>;
}

/// Validate a page range and buffer length.
pub fn check_range(start: u8, count: u8, buf_len: usize) -> Result<()> {
    let end = u16::from(start) + u16::from(count);
    if end > u16::from(PAGE_COUNT) {
        return Err(StoreError::InvalidPage { page: end - 1 });
    }
    let needed = usize::from(count) * PAGE_SIZE;
    if buf_len < needed {
        return Err(StoreError::BufferTooShort {
            needed,
            got: buf_len,
        });
    }
    Ok(())
}

/// Extension trait for common page patterns.
pub trait PageStoreExt: PageStore {
    /// Read one page.
    fn read_page(
        &self,
        page: u8,
    ) -> impl std::future::Future<Output = Result<[u8; PAGE_SIZE]>> + Send;

    /// Write one page.
    fn write_page(
        &self,
        page: u8,
        data: [u8; PAGE_SIZE],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Read all 16 pages.
    fn read_memory(&self) -> impl std::future::Future<Output = Result<MemoryImage>> + Send;

    /// Zero every application page (4-15).
    ///
    /// Stops at the first page the token refuses, so a locked token fails.
    fn erase_memory(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Hex dump of the whole token, one page per line.
    fn dump_memory(&self) -> impl std::future::Future<Output = Result<String>> + Send;
}

impl<S: PageStore + ?Sized> PageStoreExt for S {
    async fn read_page(&self, page: u8) -> Result<[u8; PAGE_SIZE]> {
        let mut buf = [0u8; PAGE_SIZE];
        self.read_pages(page, 1, &mut buf).await?;
        Ok(buf)
    }

    async fn write_page(&self, page: u8, data: [u8; PAGE_SIZE]) -> Result<()> {
        self.write_pages(&data, page, 1).await
    }

    async fn read_memory(&self) -> Result<MemoryImage> {
        let mut buf = [0u8; MEMORY_SIZE];
        self.read_pages(0, PAGE_COUNT, &mut buf).await?;
        Ok(MemoryImage::from_bytes(buf))
    }

    async fn erase_memory(&self) -> Result<()> {
        let zeros = [0u8; MEMORY_SIZE];
        let count = PAGE_COUNT - FIRST_APP_PAGE;
        self.write_pages(&zeros, FIRST_APP_PAGE, count).await
    }

    async fn dump_memory(&self) -> Result<String> {
        Ok(self.read_memory().await?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range(0, 16, 64).is_ok());
        assert!(check_range(15, 1, 4).is_ok());
        assert!(check_range(7, 2, 8).is_ok());
        assert!(check_range(5, 0, 0).is_ok());
    }

    #[test]
    fn test_check_range_rejects_out_of_bounds() {
        let err = check_range(15, 2, 8).unwrap_err();
        assert!(matches!(err, StoreError::InvalidPage { page: 16 }));
        assert!(err.is_programming_error());

        assert!(matches!(
            check_range(255, 1, 4),
            Err(StoreError::InvalidPage { page: 255 })
        ));
    }

    #[test]
    fn test_check_range_rejects_short_buffer() {
        let err = check_range(4, 2, 7).unwrap_err();
        assert!(matches!(
            err,
            StoreError::BufferTooShort { needed: 8, got: 7 }
        ));
        assert!(err.is_programming_error());
    }
}
