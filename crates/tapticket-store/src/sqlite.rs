//! SQLite-backed simulated token.
//!
//! Keeps a token image in a database file so that separate processes can
//! format, issue and use the same "token". Write rules are the chip's
//! (see [`crate::hardware`]). Blocking database calls run on
//! `tokio::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tapticket_core::layout::{page_offset, PAGE_COUNT, PAGE_SIZE};
use tapticket_core::{MemoryImage, MEMORY_SIZE};

use crate::error::{Result, StoreError};
use crate::hardware::{blank_image, program_page};
use crate::memory::DEFAULT_UID;
use crate::migration;
use crate::traits::{check_range, PageStore};

/// SQLite-based token image.
///
/// Thread-safe via internal Mutex.
pub struct SqliteCard {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCard {
    /// Open a token image at the given path, creating a blank one if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_uid(path, DEFAULT_UID)
    }

    /// Open a token image, seeding a blank token with `uid` if the file is new.
    pub fn open_with_uid(path: impl AsRef<Path>, uid: [u8; 7]) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn, uid)
    }

    /// Open an in-memory database. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, DEFAULT_UID)
    }

    fn init(mut conn: Connection, uid: [u8; 7]) -> Result<Self> {
        migration::migrate(&mut conn)?;

        let rows: u32 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        if rows == 0 {
            let blank = blank_image(uid);
            let tx = conn.transaction()?;
            for page in 0..PAGE_COUNT {
                let off = page_offset(page);
                tx.execute(
                    "INSERT INTO pages (page, data) VALUES (?1, ?2)",
                    params![page, &blank[off..off + PAGE_SIZE]],
                )?;
            }
            tx.commit()?;
            tracing::debug!("seeded blank token image");
        } else if rows != u32::from(PAGE_COUNT) {
            return Err(StoreError::InvalidData(format!(
                "token image has {} pages, expected {}",
                rows, PAGE_COUNT
            )));
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Snapshot of the current contents.
    pub async fn image(&self) -> Result<MemoryImage> {
        let conn = self.conn.clone();
        run_blocking(move || {
            let conn = lock(&conn)?;
            load_image(&conn).map(MemoryImage::from_bytes)
        })
        .await
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>> {
    conn.lock().map_err(|e| {
        StoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
            Some(format!("mutex poisoned: {}", e)),
        ))
    })
}

async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Transport(format!("spawn_blocking failed: {}", e)))?
}

fn load_image(conn: &Connection) -> Result<[u8; MEMORY_SIZE]> {
    let mut memory = [0u8; MEMORY_SIZE];
    let mut stmt = conn.prepare("SELECT page, data FROM pages ORDER BY page")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, u8>(0)?, row.get::<_, Vec<u8>>(1)?)))?;

    for row in rows {
        let (page, data) = row?;
        if page >= PAGE_COUNT || data.len() != PAGE_SIZE {
            return Err(StoreError::InvalidData(format!("bad row for page {}", page)));
        }
        let off = page_offset(page);
        memory[off..off + PAGE_SIZE].copy_from_slice(&data);
    }
    Ok(memory)
}

#[async_trait]
impl PageStore for SqliteCard {
    async fn read_pages(&self, start: u8, count: u8, dst: &mut [u8]) -> Result<()> {
        check_range(start, count, dst.len())?;
        let conn = self.conn.clone();

        let memory = run_blocking(move || {
            let conn = lock(&conn)?;
            load_image(&conn)
        })
        .await?;

        let from = page_offset(start);
        let len = usize::from(count) * PAGE_SIZE;
        dst[..len].copy_from_slice(&memory[from..from + len]);
        Ok(())
    }

    async fn write_pages(&self, src: &[u8], start: u8, count: u8) -> Result<()> {
        check_range(start, count, src.len())?;
        let src = src[..usize::from(count) * PAGE_SIZE].to_vec();
        let conn = self.conn.clone();

        run_blocking(move || {
            let conn = lock(&conn)?;
            let mut memory = load_image(&conn)?;

            // Page by page: a refused page leaves earlier pages written.
            for (i, chunk) in src.chunks_exact(PAGE_SIZE).enumerate() {
                let page = start + i as u8;
                let mut data = [0u8; PAGE_SIZE];
                data.copy_from_slice(chunk);
                program_page(&mut memory, page, data)?;

                let off = page_offset(page);
                conn.execute(
                    "UPDATE pages SET data = ?1 WHERE page = ?2",
                    params![&memory[off..off + PAGE_SIZE], page],
                )?;
            }
            Ok(())
        })
        .await
    }
}
