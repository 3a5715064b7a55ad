//! High-level database interface over the pager and the tree.
//!
//! A database file holds exactly one table. The root page is found on open
//! by its header flag rather than by a fixed position, since a root split
//! moves the root to a freshly allocated page.

use crate::access::{BTree, BTreeResult, Row, Scan};
use crate::storage::page::node;
use crate::storage::{PageId, Pager, StorageError, StorageResult};
use log::debug;
use std::path::Path;

pub struct Database {
    pager: Pager,
    root: PageId,
}

impl Database {
    /// Opens the database at `path`, creating the file (and an empty root
    /// leaf) if it does not exist yet.
    pub fn open(path: &Path, max_pages: u32) -> StorageResult<Self> {
        let mut pager = Pager::open(path, max_pages)?;
        let root = if pager.num_pages() == 0 {
            BTree::create(&mut pager)?
        } else {
            Self::locate_root(&mut pager)?
        };
        debug!("opened {:?} with root page {}", path, root.0);
        Ok(Self { pager, root })
    }

    fn locate_root(pager: &mut Pager) -> StorageResult<PageId> {
        for i in 0..pager.num_pages() {
            let page_id = PageId(i);
            if node::is_root(pager.page(page_id)?) {
                return Ok(page_id);
            }
        }
        Err(StorageError::Corrupt(
            "no page carries the root flag".to_string(),
        ))
    }

    /// Inserts a row keyed by its id.
    pub fn insert(&mut self, row: &Row) -> BTreeResult<()> {
        let mut tree = BTree::new(&mut self.pager, self.root);
        tree.insert(row.id(), row)?;
        self.root = tree.root();
        Ok(())
    }

    /// Scan over every row in key order.
    pub fn scan(&mut self) -> BTreeResult<Scan<'_>> {
        let mut tree = BTree::new(&mut self.pager, self.root);
        let cursor = tree.start()?;
        Ok(Scan::new(&mut self.pager, cursor))
    }

    /// Indented description of the tree, for the `.btree` meta command.
    pub fn dump_tree(&mut self) -> BTreeResult<String> {
        BTree::new(&mut self.pager, self.root).dump()
    }

    /// Flushes every cached page and syncs the file.
    pub fn close(mut self) -> StorageResult<()> {
        self.pager.flush()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Best effort flush; close() reports errors properly.
        if let Err(err) = self.pager.flush() {
            log::error!("flush on drop failed: {}", err);
        }
    }
}
