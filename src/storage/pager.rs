//! Page cache between the B+Tree and the backing file.
//!
//! The pager is an arena indexed by page number: buffers are loaded lazily
//! on first touch, new pages are allocated monotonically, and nothing is
//! evicted or freed while the database is open. `flush` writes every cached
//! page back in page-number order.

use crate::storage::disk::{PageManager, PAGE_SIZE};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use log::{debug, trace};
use std::path::Path;

pub const DEFAULT_MAX_PAGES: u32 = 100;

pub struct Pager {
    disk: PageManager,
    pages: Vec<Option<Box<[u8; PAGE_SIZE]>>>,
    num_pages: u32,
    max_pages: u32,
    dirty: bool,
}

impl Pager {
    /// Opens (or creates) the backing file. `max_pages` bounds how many
    /// pages the table may ever hold.
    pub fn open(path: &Path, max_pages: u32) -> StorageResult<Self> {
        let disk = PageManager::open(path)?;
        let num_pages = disk.num_pages()?;
        debug!("opened pager: {} pages on disk, limit {}", num_pages, max_pages);

        let mut pages = Vec::new();
        pages.resize_with(num_pages as usize, || None);

        Ok(Self {
            disk,
            pages,
            num_pages,
            max_pages,
            dirty: false,
        })
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Shared view of a page, loading it from disk on first access.
    pub fn page(&mut self, page_id: PageId) -> StorageResult<&[u8; PAGE_SIZE]> {
        self.load(page_id)?;
        Ok(self.pages[page_id.0 as usize].as_deref().expect("just loaded"))
    }

    /// Mutable view of a page; marks the pager dirty.
    pub fn page_mut(&mut self, page_id: PageId) -> StorageResult<&mut [u8; PAGE_SIZE]> {
        self.load(page_id)?;
        self.dirty = true;
        Ok(self.pages[page_id.0 as usize]
            .as_deref_mut()
            .expect("just loaded"))
    }

    fn load(&mut self, page_id: PageId) -> StorageResult<()> {
        let index = page_id.0 as usize;
        if page_id.0 >= self.num_pages {
            return Err(StorageError::PageNotFound(page_id));
        }
        if self.pages[index].is_none() {
            trace!("loading page {} from disk", page_id.0);
            let mut buf = Box::new([0u8; PAGE_SIZE]);
            self.disk.read_page(page_id, buf.as_mut())?;
            self.pages[index] = Some(buf);
        }
        Ok(())
    }

    /// Reserves the next unused page number with a zeroed buffer. The slot
    /// only reaches the file on `flush`.
    pub fn allocate(&mut self) -> StorageResult<PageId> {
        if self.num_pages >= self.max_pages {
            return Err(StorageError::PageLimitReached {
                limit: self.max_pages,
            });
        }
        let page_id = PageId(self.num_pages);
        self.pages.push(Some(Box::new([0u8; PAGE_SIZE])));
        self.num_pages += 1;
        self.dirty = true;
        trace!("allocated page {}", page_id.0);
        Ok(page_id)
    }

    /// Fails up front when `extra` more pages would pass the limit. Lets a
    /// multi-page split refuse cleanly before any node has been mutated.
    pub fn ensure_capacity(&self, extra: u32) -> StorageResult<()> {
        if self.num_pages + extra > self.max_pages {
            return Err(StorageError::PageLimitReached {
                limit: self.max_pages,
            });
        }
        Ok(())
    }

    /// Writes every cached page back in page-number order, then syncs.
    /// Idempotent: a second call with no intervening writes does nothing.
    pub fn flush(&mut self) -> StorageResult<()> {
        if !self.dirty {
            return Ok(());
        }
        debug!("flushing {} pages", self.num_pages);
        for i in 0..self.num_pages {
            if let Some(buf) = &self.pages[i as usize] {
                self.disk.write_page(PageId(i), buf.as_ref())?;
            }
        }
        self.disk.sync()?;
        self.dirty = false;
        Ok(())
    }
}
