//! Internal node layout.
//!
//! After the common header: `num_keys: u32` at offset 6 and
//! `right_child: u32` at offset 10. Cells follow from offset 14, each a
//! `u32` child page plus a `u32` separator key. A cell's key is the maximum
//! key of the subtree rooted at its child; `right_child` covers everything
//! greater than the last separator.

use crate::storage::page::node::{self, NodeKind, COMMON_HEADER_SIZE};
use crate::storage::page::PageId;
use crate::storage::pager::Pager;
use crate::storage::{StorageResult, PAGE_SIZE};

const NUM_KEYS_OFFSET: usize = COMMON_HEADER_SIZE;
const RIGHT_CHILD_OFFSET: usize = NUM_KEYS_OFFSET + 4;
pub const INTERNAL_HEADER_SIZE: usize = RIGHT_CHILD_OFFSET + 4;

const CHILD_SIZE: usize = 4;
const KEY_SIZE: usize = 4;
pub const INTERNAL_CELL_SIZE: usize = CHILD_SIZE + KEY_SIZE;
pub const INTERNAL_MAX_KEYS: usize = (PAGE_SIZE - INTERNAL_HEADER_SIZE) / INTERNAL_CELL_SIZE;

// Splits mirror the leaf's left bias: promote one key, keep the larger half
// of the remainder on the left.
pub const INTERNAL_RIGHT_SPLIT_COUNT: usize = INTERNAL_MAX_KEYS / 2;
pub const INTERNAL_LEFT_SPLIT_COUNT: usize = INTERNAL_MAX_KEYS - INTERNAL_RIGHT_SPLIT_COUNT;

pub struct InternalPage {
    pub page_id: PageId,
    data: [u8; PAGE_SIZE],
}

impl InternalPage {
    pub fn new(page_id: PageId) -> Self {
        let mut page = Self {
            page_id,
            data: [0; PAGE_SIZE],
        };
        node::set_kind(&mut page.data, NodeKind::Internal);
        page
    }

    pub fn load(pager: &mut Pager, page_id: PageId) -> StorageResult<Self> {
        let buf = pager.page(page_id)?;
        debug_assert_eq!(node::kind(buf), NodeKind::Internal);
        let mut data = [0u8; PAGE_SIZE];
        data.copy_from_slice(buf);
        Ok(Self { page_id, data })
    }

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

    pub fn num_keys(&self) -> usize {
        u32::from_le_bytes([
            self.data[NUM_KEYS_OFFSET],
            self.data[NUM_KEYS_OFFSET + 1],
            self.data[NUM_KEYS_OFFSET + 2],
            self.data[NUM_KEYS_OFFSET + 3],
        ]) as usize
    }

    pub fn set_num_keys(&mut self, num_keys: usize) {
        debug_assert!(num_keys <= INTERNAL_MAX_KEYS);
        self.data[NUM_KEYS_OFFSET..NUM_KEYS_OFFSET + 4]
            .copy_from_slice(&(num_keys as u32).to_le_bytes());
    }

    pub fn right_child(&self) -> PageId {
        PageId(u32::from_le_bytes([
            self.data[RIGHT_CHILD_OFFSET],
            self.data[RIGHT_CHILD_OFFSET + 1],
            self.data[RIGHT_CHILD_OFFSET + 2],
            self.data[RIGHT_CHILD_OFFSET + 3],
        ]))
    }

    pub fn set_right_child(&mut self, child: PageId) {
        self.data[RIGHT_CHILD_OFFSET..RIGHT_CHILD_OFFSET + 4]
            .copy_from_slice(&child.0.to_le_bytes());
    }

    fn cell_offset(index: usize) -> usize {
        INTERNAL_HEADER_SIZE + index * INTERNAL_CELL_SIZE
    }

    pub fn child(&self, index: usize) -> PageId {
        debug_assert!(index < self.num_keys());
        let offset = Self::cell_offset(index);
        PageId(u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ]))
    }

    pub fn key(&self, index: usize) -> u32 {
        debug_assert!(index < self.num_keys());
        let offset = Self::cell_offset(index) + CHILD_SIZE;
        u32::from_le_bytes([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
            self.data[offset + 3],
        ])
    }

    pub fn set_key(&mut self, index: usize, key: u32) {
        debug_assert!(index < self.num_keys());
        let offset = Self::cell_offset(index) + CHILD_SIZE;
        self.data[offset..offset + KEY_SIZE].copy_from_slice(&key.to_le_bytes());
    }

    pub fn set_cell(&mut self, index: usize, child: PageId, key: u32) {
        let offset = Self::cell_offset(index);
        self.data[offset..offset + CHILD_SIZE].copy_from_slice(&child.0.to_le_bytes());
        self.data[offset + CHILD_SIZE..offset + INTERNAL_CELL_SIZE]
            .copy_from_slice(&key.to_le_bytes());
    }

    /// Inserts a `(child, key)` cell at `index`, shifting later cells right.
    pub fn insert_cell(&mut self, index: usize, child: PageId, key: u32) {
        let num_keys = self.num_keys();
        debug_assert!(num_keys < INTERNAL_MAX_KEYS);
        debug_assert!(index <= num_keys);

        if index < num_keys {
            let src = Self::cell_offset(index);
            let dst = Self::cell_offset(index + 1);
            let len = (num_keys - index) * INTERNAL_CELL_SIZE;
            self.data.copy_within(src..src + len, dst);
        }
        self.set_num_keys(num_keys + 1);
        self.set_cell(index, child, key);
    }

    /// Index of the child subtree that covers `key`: the first cell whose
    /// separator is >= `key` (a separator equals its subtree's maximum, so
    /// ties descend left). `num_keys` means the right child.
    pub fn find_child_index(&self, key: u32) -> usize {
        let mut min = 0;
        let mut max = self.num_keys();
        while min != max {
            let mid = (min + max) / 2;
            if self.key(mid) >= key {
                max = mid;
            } else {
                min = mid + 1;
            }
        }
        min
    }

    /// Child page at a `find_child_index` result.
    pub fn child_at(&self, index: usize) -> PageId {
        if index == self.num_keys() {
            self.right_child()
        } else {
            self.child(index)
        }
    }

    /// Position of `child_page` among the children, `num_keys` meaning the
    /// right child.
    pub fn position_of_child(&self, child_page: PageId) -> Option<usize> {
        for i in 0..self.num_keys() {
            if self.child(i) == child_page {
                return Some(i);
            }
        }
        if self.right_child() == child_page {
            return Some(self.num_keys());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_constants() {
        assert_eq!(INTERNAL_HEADER_SIZE, 14);
        assert_eq!(INTERNAL_CELL_SIZE, 8);
        assert_eq!(INTERNAL_MAX_KEYS, 510);
        assert_eq!(INTERNAL_LEFT_SPLIT_COUNT + INTERNAL_RIGHT_SPLIT_COUNT, 510);
        assert!(INTERNAL_LEFT_SPLIT_COUNT >= INTERNAL_RIGHT_SPLIT_COUNT);
    }

    #[test]
    fn test_new_internal_is_empty() {
        let page = InternalPage::new(PageId(3));
        assert_eq!(page.num_keys(), 0);
        assert!(!page.is_root());
    }

    #[test]
    fn test_cells_and_right_child() {
        let mut page = InternalPage::new(PageId(0));
        page.insert_cell(0, PageId(1), 10);
        page.insert_cell(1, PageId(2), 20);
        page.set_right_child(PageId(3));

        assert_eq!(page.num_keys(), 2);
        assert_eq!(page.child(0), PageId(1));
        assert_eq!(page.key(0), 10);
        assert_eq!(page.child(1), PageId(2));
        assert_eq!(page.key(1), 20);
        assert_eq!(page.right_child(), PageId(3));
    }

    #[test]
    fn test_insert_cell_shifts() {
        let mut page = InternalPage::new(PageId(0));
        page.insert_cell(0, PageId(1), 10);
        page.insert_cell(1, PageId(3), 30);
        page.insert_cell(1, PageId(2), 20);

        assert_eq!(page.key(0), 10);
        assert_eq!(page.key(1), 20);
        assert_eq!(page.key(2), 30);
        assert_eq!(page.child(1), PageId(2));
        assert_eq!(page.child(2), PageId(3));
    }

    #[test]
    fn test_find_child_index_ties_go_left() {
        let mut page = InternalPage::new(PageId(0));
        page.insert_cell(0, PageId(1), 7);
        page.insert_cell(1, PageId(2), 15);
        page.set_right_child(PageId(3));

        assert_eq!(page.find_child_index(1), 0);
        // A separator is its subtree's max, so an equal key descends left
        assert_eq!(page.find_child_index(7), 0);
        assert_eq!(page.find_child_index(8), 1);
        assert_eq!(page.find_child_index(15), 1);
        assert_eq!(page.find_child_index(16), 2);
        assert_eq!(page.child_at(2), PageId(3));
    }

    #[test]
    fn test_position_of_child() {
        let mut page = InternalPage::new(PageId(0));
        page.insert_cell(0, PageId(5), 10);
        page.insert_cell(1, PageId(6), 20);
        page.set_right_child(PageId(7));

        assert_eq!(page.position_of_child(PageId(5)), Some(0));
        assert_eq!(page.position_of_child(PageId(6)), Some(1));
        assert_eq!(page.position_of_child(PageId(7)), Some(2));
        assert_eq!(page.position_of_child(PageId(99)), None);
    }

    #[test]
    fn test_set_key_updates_in_place() {
        let mut page = InternalPage::new(PageId(0));
        page.insert_cell(0, PageId(1), 10);
        page.set_key(0, 12);
        assert_eq!(page.key(0), 12);
        assert_eq!(page.child(0), PageId(1));
    }
}
