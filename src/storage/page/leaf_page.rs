//! Leaf node layout.
//!
//! After the common header: `num_cells: u32` at offset 6 and
//! `next_leaf: u32` at offset 10 (0 = no right sibling; page 0 is always the
//! leftmost leaf, so 0 is free to act as the sentinel). Cells follow from
//! offset 14, each a `u32` key plus one serialized row.

use crate::access::row::{Row, ROW_SIZE};
use crate::storage::page::node::{self, NodeKind, COMMON_HEADER_SIZE};
use crate::storage::page::PageId;
use crate::storage::pager::Pager;
use crate::storage::{StorageResult, PAGE_SIZE};

const NUM_CELLS_OFFSET: usize = COMMON_HEADER_SIZE;
const NEXT_LEAF_OFFSET: usize = NUM_CELLS_OFFSET + 4;
pub const LEAF_HEADER_SIZE: usize = NEXT_LEAF_OFFSET + 4;

pub const LEAF_KEY_SIZE: usize = 4;
pub const LEAF_CELL_SIZE: usize = LEAF_KEY_SIZE + ROW_SIZE;
pub const LEAF_SPACE_FOR_CELLS: usize = PAGE_SIZE - LEAF_HEADER_SIZE;
pub const LEAF_MAX_CELLS: usize = LEAF_SPACE_FOR_CELLS / LEAF_CELL_SIZE;

// A split distributes LEAF_MAX_CELLS + 1 cells with any odd cell going left.
pub const LEAF_RIGHT_SPLIT_COUNT: usize = (LEAF_MAX_CELLS + 1) / 2;
pub const LEAF_LEFT_SPLIT_COUNT: usize = LEAF_MAX_CELLS + 1 - LEAF_RIGHT_SPLIT_COUNT;

pub struct LeafPage {
    pub page_id: PageId,
    data: [u8; PAGE_SIZE],
}

impl LeafPage {
    /// Initializes an empty leaf. The caller decides root flag and parent.
    pub fn new(page_id: PageId) -> Self {
        let mut page = Self {
            page_id,
            data: [0; PAGE_SIZE],
        };
        node::set_kind(&mut page.data, NodeKind::Leaf);
        page
    }

    /// Copies the page out of the pager. The buffer must hold a leaf node.
    pub fn load(pager: &mut Pager, page_id: PageId) -> StorageResult<Self> {
        let buf = pager.page(page_id)?;
        debug_assert_eq!(node::kind(buf), NodeKind::Leaf);
        let mut data = [0u8; PAGE_SIZE];
        data.copy_from_slice(buf);
        Ok(Self { page_id, data })
    }

    /// Writes the view back into the pager.
    pub fn save(&self, pager: &mut Pager) -> StorageResult<()> {
        pager.page_mut(self.page_id)?.copy_from_slice(&self.data);
        Ok(())
    }

    pub fn is_root(&self) -> bool {
        node::is_root(&self.data)
    }

    pub fn set_is_root(&mut self, is_root: bool) {
        node::set_is_root(&mut self.data, is_root);
    }

    pub fn parent(&self) -> PageId {
        node::parent(&self.data)
    }

    pub fn set_parent(&mut self, parent: PageId) {
        node::set_parent(&mut self.data, parent);
    }

    pub fn num_cells(&self) -> usize {
        u32::from_le_bytes([
            self.data[NUM_CELLS_OFFSET],
            self.data[NUM_CELLS_OFFSET + 1],
            self.data[NUM_CELLS_OFFSET + 2],
            self.data[NUM_CELLS_OFFSET + 3],
        ]) as usize
    }

    pub fn set_num_cells(&mut self, num_cells: usize) {
        debug_assert!(num_cells <= LEAF_MAX_CELLS);
        self.data[NUM_CELLS_OFFSET..NUM_CELLS_OFFSET + 4]
            .copy_from_slice(&(num_cells as u32).to_le_bytes());
    }

    pub fn next_leaf(&self) -> Option<PageId> {
        let id = u32::from_le_bytes([
            self.data[NEXT_LEAF_OFFSET],
            self.data[NEXT_LEAF_OFFSET + 1],
            self.data[NEXT_LEAF_OFFSET + 2],
            self.data[NEXT_LEAF_OFFSET + 3],
        ]);
        if id == 0 {
            None
        } else {
            Some(PageId(id))
        }
    }

    pub fn set_next_leaf(&mut self, next: Option<PageId>) {
        let id = next.map(|p| p.0).unwrap_or(0);
        self.data[NEXT_LEAF_OFFSET..NEXT_LEAF_OFFSET + 4].copy_from_slice(&id.to_le_bytes());
    }

    fn cell_offset(index: usize) -> usize {
        LEAF_HEADER_SIZE + index * LEAF_CELL_SIZE
    }

    pub fn key(&self, index: usize) -> u32 {
        debug_assert!(index < self.num_cells());
        let offset = Self::cell_offset(index);
        u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    fn row_bytes(&self, index: usize) -> &[u8] {
        debug_assert!(index < self.num_cells());
        let offset = Self::cell_offset(index) + LEAF_KEY_SIZE;
        &self.data[offset..offset + ROW_SIZE]
    }

    pub fn row(&self, index: usize) -> Row {
        Row::deserialize(self.row_bytes(index))
    }

    /// Largest key in the leaf, if any.
    pub fn max_key(&self) -> Option<u32> {
        let n = self.num_cells();
        if n == 0 {
            None
        } else {
            Some(self.key(n - 1))
        }
    }

    fn write_cell(&mut self, index: usize, key: u32, row: &Row) {
        let offset = Self::cell_offset(index);
        self.data[offset..offset + LEAF_KEY_SIZE].copy_from_slice(&key.to_le_bytes());
        row.serialize(&mut self.data[offset + LEAF_KEY_SIZE..offset + LEAF_CELL_SIZE]);
    }

    /// Inserts a cell at `index`, shifting later cells right. The leaf must
    /// have free capacity.
    pub fn insert_cell(&mut self, index: usize, key: u32, row: &Row) {
        let num_cells = self.num_cells();
        debug_assert!(num_cells < LEAF_MAX_CELLS);
        debug_assert!(index <= num_cells);

        if index < num_cells {
            let src = Self::cell_offset(index);
            let dst = Self::cell_offset(index + 1);
            let len = (num_cells - index) * LEAF_CELL_SIZE;
            self.data.copy_within(src..src + len, dst);
        }
        self.write_cell(index, key, row);
        self.set_num_cells(num_cells + 1);
    }

    /// Position of `key`, or where it would be inserted: the first cell whose
    /// key is >= `key`.
    pub fn find_cell(&self, key: u32) -> usize {
        let mut min = 0;
        let mut max = self.num_cells();
        while min != max {
            let mid = (min + max) / 2;
            let mid_key = self.key(mid);
            if key == mid_key {
                return mid;
            }
            if key < mid_key {
                max = mid;
            } else {
                min = mid + 1;
            }
        }
        min
    }

    /// Splits a full leaf while inserting `(key, row)` at `insert_index`.
    /// The combined `LEAF_MAX_CELLS + 1` cells are dealt out so that this
    /// leaf keeps the lower `LEAF_LEFT_SPLIT_COUNT` and `right` receives the
    /// rest. Sibling links and parent entries are the caller's job.
    pub fn split_insert(&mut self, right: &mut LeafPage, insert_index: usize, key: u32, row: &Row) {
        debug_assert_eq!(self.num_cells(), LEAF_MAX_CELLS);
        let old = self.data;

        for i in (0..=LEAF_MAX_CELLS).rev() {
            let dest = if i >= LEAF_LEFT_SPLIT_COUNT {
                &mut *right
            } else {
                &mut *self
            };
            let dest_index = i % LEAF_LEFT_SPLIT_COUNT;
            let dest_offset = Self::cell_offset(dest_index);

            if i == insert_index {
                dest.write_cell(dest_index, key, row);
            } else {
                let src_index = if i > insert_index { i - 1 } else { i };
                let src_offset = Self::cell_offset(src_index);
                dest.data[dest_offset..dest_offset + LEAF_CELL_SIZE]
                    .copy_from_slice(&old[src_offset..src_offset + LEAF_CELL_SIZE]);
            }
        }

        self.set_num_cells(LEAF_LEFT_SPLIT_COUNT);
        right.set_num_cells(LEAF_RIGHT_SPLIT_COUNT);
    }
}
