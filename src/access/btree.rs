//! B+Tree over pager-backed pages.
//!
//! Leaves hold `(key, row)` cells, internal nodes hold `(child, separator)`
//! pairs where a separator equals the maximum key of its child's subtree.
//! Inserting into a full node splits it: leaves redistribute
//! `LEAF_MAX_CELLS + 1` cells with the odd cell going left, internal nodes
//! promote the median separator, and either case recurses into the parent.
//! A root split allocates a brand-new root page; the old root keeps its page
//! number and becomes the left child, so the root moves over time and is
//! located on reopen by its header flag.

pub mod cursor;

pub use cursor::{Cursor, Scan};

use crate::access::row::Row;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::internal_page::{INTERNAL_LEFT_SPLIT_COUNT, INTERNAL_MAX_KEYS};
use crate::storage::page::leaf_page::LEAF_MAX_CELLS;
use crate::storage::page::{node, InternalPage, LeafPage, NodeKind};
use crate::storage::pager::Pager;
use crate::storage::PageId;
use log::debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BTreeError {
    #[error("Duplicate key: {0}")]
    DuplicateKey(u32),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type BTreeResult<T> = Result<T, BTreeError>;

/// Tree handle for one operation: borrows the pager and tracks the root,
/// which moves when a root split allocates a new top page.
pub struct BTree<'a> {
    pager: &'a mut Pager,
    root: PageId,
}

impl<'a> BTree<'a> {
    pub fn new(pager: &'a mut Pager, root: PageId) -> Self {
        Self { pager, root }
    }

    /// Initializes a fresh tree: one empty leaf marked as root.
    pub fn create(pager: &mut Pager) -> StorageResult<PageId> {
        let page_id = pager.allocate()?;
        let mut root = LeafPage::new(page_id);
        root.set_is_root(true);
        root.save(pager)?;
        Ok(page_id)
    }

    pub fn root(&self) -> PageId {
        self.root
    }

    /// Descends to the leaf that covers `key` and returns the cell position
    /// where it lives or would be inserted.
    pub fn find(&mut self, key: u32) -> BTreeResult<Cursor> {
        let mut page = self.root;
        loop {
            match node::kind(self.pager.page(page)?) {
                NodeKind::Leaf => {
                    let leaf = LeafPage::load(self.pager, page)?;
                    return Ok(Cursor {
                        page,
                        cell: leaf.find_cell(key),
                        end_of_table: false,
                    });
                }
                NodeKind::Internal => {
                    let internal = InternalPage::load(self.pager, page)?;
                    page = internal.child_at(internal.find_child_index(key));
                }
            }
        }
    }

    /// Cursor at the first row of the table in key order.
    pub fn start(&mut self) -> BTreeResult<Cursor> {
        let mut cursor = self.find(0)?;
        let leaf = LeafPage::load(self.pager, cursor.page)?;
        cursor.end_of_table = leaf.num_cells() == 0;
        Ok(cursor)
    }

    /// Inserts `(key, row)`. An existing key fails with `DuplicateKey` and
    /// leaves the tree (and the file) untouched; so does running out of
    /// pages mid-split, which is checked before any node is mutated.
    pub fn insert(&mut self, key: u32, row: &Row) -> BTreeResult<()> {
        let cursor = self.find(key)?;
        let mut leaf = LeafPage::load(self.pager, cursor.page)?;

        if cursor.cell < leaf.num_cells() && leaf.key(cursor.cell) == key {
            return Err(BTreeError::DuplicateKey(key));
        }

        if leaf.num_cells() < LEAF_MAX_CELLS {
            leaf.insert_cell(cursor.cell, key, row);
            leaf.save(self.pager)?;
            return Ok(());
        }

        self.split_leaf_and_insert(leaf, cursor.cell, key, row)
    }

    /// Splits a full leaf while inserting the new cell, then pushes the new
    /// separator into the parent.
    fn split_leaf_and_insert(
        &mut self,
        mut leaf: LeafPage,
        insert_index: usize,
        key: u32,
        row: &Row,
    ) -> BTreeResult<()> {
        let demand = self.split_page_demand(&leaf)?;
        self.pager.ensure_capacity(demand)?;
        debug!(
            "splitting leaf page {} ({} new pages needed)",
            leaf.page_id.0, demand
        );

        let right_page = self.pager.allocate()?;
        let mut right = LeafPage::new(right_page);
        right.set_parent(leaf.parent());

        leaf.split_insert(&mut right, insert_index, key, row);
        right.set_next_leaf(leaf.next_leaf());
        leaf.set_next_leaf(Some(right_page));

        let left_max = leaf.key(leaf.num_cells() - 1);
        let right_max = right.key(right.num_cells() - 1);

        if leaf.is_root() {
            let left_page = leaf.page_id;
            leaf.set_is_root(false);
            leaf.save(self.pager)?;
            right.save(self.pager)?;
            self.create_new_root(left_page, left_max, right_page)
        } else {
            let parent_page = leaf.parent();
            let left_page = leaf.page_id;
            leaf.save(self.pager)?;
            right.save(self.pager)?;
            self.insert_into_parent(parent_page, left_page, left_max, right_page, right_max)
        }
    }

    /// Number of fresh pages the pending split chain needs: one for the leaf's
    /// new sibling, one per full ancestor, one more if the topmost split node
    /// is the root.
    fn split_page_demand(&mut self, leaf: &LeafPage) -> BTreeResult<u32> {
        let mut demand = 1;
        let mut is_root = leaf.is_root();
        let mut parent = leaf.parent();
        loop {
            if is_root {
                demand += 1;
                break;
            }
            let node = InternalPage::load(self.pager, parent)?;
            if node.num_keys() < INTERNAL_MAX_KEYS {
                break;
            }
            demand += 1;
            is_root = node.is_root();
            parent = node.parent();
        }
        Ok(demand)
    }

    /// Records `(left, left_max)` and `(right, right_max)` in the parent
    /// after a child split: the left child keeps its slot with its reduced
    /// maximum, the right child is inserted just after (or becomes the new
    /// rightmost child). Splits the parent too when it is already full.
    fn insert_into_parent(
        &mut self,
        parent_page: PageId,
        left_page: PageId,
        left_max: u32,
        right_page: PageId,
        right_max: u32,
    ) -> BTreeResult<()> {
        let mut parent = InternalPage::load(self.pager, parent_page)?;
        let left_pos = parent
            .position_of_child(left_page)
            .ok_or_else(|| StorageError::Corrupt(format!(
                "page {} not referenced by its parent {}",
                left_page.0, parent_page.0
            )))?;

        if parent.num_keys() < INTERNAL_MAX_KEYS {
            if left_pos == parent.num_keys() {
                // Left child was the rightmost: it gains a separator and the
                // new sibling takes its place on the right edge.
                parent.insert_cell(left_pos, left_page, left_max);
                parent.set_right_child(right_page);
            } else {
                parent.set_key(left_pos, left_max);
                parent.insert_cell(left_pos + 1, right_page, right_max);
            }
            parent.save(self.pager)?;
            return Ok(());
        }

        self.split_internal_and_insert(parent, left_pos, left_max, right_page, right_max)
    }

    /// Splits a full internal node that must absorb one more child. The
    /// overflowed separator sequence is cut at the median: the left node
    /// keeps `INTERNAL_LEFT_SPLIT_COUNT` keys, the median moves up to the
    /// parent, the rest go to a fresh right node, and every migrated child
    /// is repointed at it.
    fn split_internal_and_insert(
        &mut self,
        mut parent: InternalPage,
        left_pos: usize,
        left_max: u32,
        right_page: PageId,
        right_max: u32,
    ) -> BTreeResult<()> {
        let num_keys = parent.num_keys();
        let mut children: Vec<PageId> = (0..num_keys).map(|i| parent.child(i)).collect();
        children.push(parent.right_child());
        let mut keys: Vec<u32> = (0..num_keys).map(|i| parent.key(i)).collect();

        if left_pos == num_keys {
            keys.push(left_max);
            children.push(right_page);
        } else {
            keys[left_pos] = left_max;
            children.insert(left_pos + 1, right_page);
            keys.insert(left_pos + 1, right_max);
        }

        // The split node's subtree maximum stays with the rightmost child,
        // which ends up in the new right node; it becomes that node's
        // separator one level up.
        let split_right_max = self.subtree_max(children[children.len() - 1])?;

        let promote_index = INTERNAL_LEFT_SPLIT_COUNT;
        let promoted_key = keys[promote_index];

        debug!(
            "splitting internal page {} promoting key {}",
            parent.page_id.0, promoted_key
        );

        let new_right_page = self.pager.allocate()?;
        let mut new_right = InternalPage::new(new_right_page);
        new_right.set_parent(parent.parent());

        new_right.set_num_keys(keys.len() - promote_index - 1);
        for (dest, src) in (promote_index + 1..keys.len()).enumerate() {
            new_right.set_cell(dest, children[src], keys[src]);
        }
        new_right.set_right_child(children[children.len() - 1]);

        // The spliced-in child can land in the retained half, so its cells
        // are rewritten from the edited vectors as well.
        parent.set_num_keys(promote_index);
        for i in 0..promote_index {
            parent.set_cell(i, children[i], keys[i]);
        }
        parent.set_right_child(children[promote_index]);

        for child in &children[promote_index + 1..] {
            node::set_parent(self.pager.page_mut(*child)?, new_right_page);
        }

        if parent.is_root() {
            let left_page = parent.page_id;
            parent.set_is_root(false);
            parent.save(self.pager)?;
            new_right.save(self.pager)?;
            self.create_new_root(left_page, promoted_key, new_right_page)
        } else {
            let grandparent = parent.parent();
            let left_page = parent.page_id;
            parent.save(self.pager)?;
            new_right.save(self.pager)?;
            self.insert_into_parent(
                grandparent,
                left_page,
                promoted_key,
                new_right_page,
                split_right_max,
            )
        }
    }

    /// Puts a brand-new internal root above two siblings. The old root keeps
    /// its page number as the left child; both children are repointed.
    fn create_new_root(
        &mut self,
        left_page: PageId,
        left_max: u32,
        right_page: PageId,
    ) -> BTreeResult<()> {
        let root_page = self.pager.allocate()?;
        debug!("new root page {}", root_page.0);

        let mut root = InternalPage::new(root_page);
        root.set_is_root(true);
        root.set_num_keys(1);
        root.set_cell(0, left_page, left_max);
        root.set_right_child(right_page);
        root.save(self.pager)?;

        node::set_parent(self.pager.page_mut(left_page)?, root_page);
        node::set_parent(self.pager.page_mut(right_page)?, root_page);

        self.root = root_page;
        Ok(())
    }

    /// Maximum key in the subtree under `page`, following the right spine.
    fn subtree_max(&mut self, page: PageId) -> BTreeResult<u32> {
        let mut current = page;
        loop {
            match node::kind(self.pager.page(current)?) {
                NodeKind::Leaf => {
                    let leaf = LeafPage::load(self.pager, current)?;
                    return match leaf.max_key() {
                        Some(key) => Ok(key),
                        None => Err(StorageError::Corrupt(format!(
                            "empty leaf {} inside a populated tree",
                            current.0
                        ))
                        .into()),
                    };
                }
                NodeKind::Internal => {
                    let internal = InternalPage::load(self.pager, current)?;
                    current = internal.right_child();
                }
            }
        }
    }

    /// Indented description of the whole tree, one space per depth level.
    pub fn dump(&mut self) -> BTreeResult<String> {
        let mut out = String::new();
        self.dump_node(self.root, 0, &mut out)?;
        Ok(out)
    }

    fn dump_node(&mut self, page: PageId, level: usize, out: &mut String) -> BTreeResult<()> {
        match node::kind(self.pager.page(page)?) {
            NodeKind::Leaf => {
                let leaf = LeafPage::load(self.pager, page)?;
                indent(out, level);
                out.push_str(&format!("- leaf (size {})\n", leaf.num_cells()));
                for i in 0..leaf.num_cells() {
                    indent(out, level + 1);
                    out.push_str(&format!("- {}\n", leaf.key(i)));
                }
            }
            NodeKind::Internal => {
                let internal = InternalPage::load(self.pager, page)?;
                indent(out, level);
                out.push_str(&format!("- internal (size {})\n", internal.num_keys()));
                for i in 0..internal.num_keys() {
                    self.dump_node(internal.child(i), level + 1, out)?;
                    indent(out, level + 1);
                    out.push_str(&format!("- key {}\n", internal.key(i)));
                }
                self.dump_node(internal.right_child(), level + 1, out)?;
            }
        }
        Ok(())
    }
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn row(id: u32) -> Row {
        Row::new(id, &format!("user{}", id), &format!("user{}@example.com", id)).unwrap()
    }

    fn open_pager(dir: &tempfile::TempDir, max_pages: u32) -> Result<Pager> {
        Ok(Pager::open(&dir.path().join("test.db"), max_pages)?)
    }

    fn insert_all(pager: &mut Pager, root: PageId, keys: &[u32]) -> Result<PageId> {
        let mut tree = BTree::new(pager, root);
        for &key in keys {
            tree.insert(key, &row(key))?;
        }
        Ok(tree.root())
    }

    fn collect_keys(pager: &mut Pager, root: PageId) -> Result<Vec<u32>> {
        let mut tree = BTree::new(pager, root);
        let cursor = tree.start()?;
        let mut scan = Scan::new(pager, cursor);
        let mut keys = Vec::new();
        while let Some(row) = scan.next_row()? {
            keys.push(row.id());
        }
        Ok(keys)
    }

    #[test]
    fn test_create_empty_tree() -> Result<()> {
        let dir = tempdir()?;
        let mut pager = open_pager(&dir, 100)?;
        let root = BTree::create(&mut pager)?;

        assert_eq!(root, PageId(0));
        let leaf = LeafPage::load(&mut pager, root)?;
        assert!(leaf.is_root());
        assert_eq!(leaf.num_cells(), 0);

        let mut tree = BTree::new(&mut pager, root);
        let cursor = tree.start()?;
        assert!(cursor.end_of_table);
        Ok(())
    }

    #[test]
    fn test_insert_and_find() -> Result<()> {
        let dir = tempdir()?;
        let mut pager = open_pager(&dir, 100)?;
        let root = BTree::create(&mut pager)?;
        let root = insert_all(&mut pager, root, &[3, 1, 2])?;

        let mut tree = BTree::new(&mut pager, root);
        let cursor = tree.find(2)?;
        assert_eq!(cursor.cell, 1);
        assert_eq!(cursor.row(&mut pager)?.id(), 2);
        Ok(())
    }

    #[test]
    fn test_duplicate_key_rejected_without_mutation() -> Result<()> {
        let dir = tempdir()?;
        let mut pager = open_pager(&dir, 100)?;
        let root = BTree::create(&mut pager)?;
        let root = insert_all(&mut pager, root, &[1, 2, 3])?;

        let mut tree = BTree::new(&mut pager, root);
        let result = tree.insert(2, &row(2));
        assert!(matches!(result, Err(BTreeError::DuplicateKey(2))));

        assert_eq!(collect_keys(&mut pager, root)?, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_scan_is_sorted_after_shuffled_inserts() -> Result<()> {
        use rand::seq::SliceRandom;

        let dir = tempdir()?;
        let mut pager = open_pager(&dir, 100)?;
        let root = BTree::create(&mut pager)?;

        let mut keys: Vec<u32> = (1..=200).collect();
        keys.shuffle(&mut rand::thread_rng());
        let root = insert_all(&mut pager, root, &keys)?;

        let expected: Vec<u32> = (1..=200).collect();
        assert_eq!(collect_keys(&mut pager, root)?, expected);
        Ok(())
    }

    #[test]
    fn test_first_leaf_split_shape() -> Result<()> {
        let dir = tempdir()?;
        let mut pager = open_pager(&dir, 100)?;
        let root = BTree::create(&mut pager)?;
        let keys: Vec<u32> = (1..=14).collect();
        let root = insert_all(&mut pager, root, &keys)?;

        // A brand-new page became the root; the old leaf kept page 0.
        assert_ne!(root, PageId(0));
        let root_node = InternalPage::load(&mut pager, root)?;
        assert!(root_node.is_root());
        assert_eq!(root_node.num_keys(), 1);
        assert_eq!(root_node.key(0), 7);

        let left = LeafPage::load(&mut pager, root_node.child(0))?;
        let right = LeafPage::load(&mut pager, root_node.right_child())?;
        assert_eq!(left.num_cells(), 7);
        assert_eq!(right.num_cells(), 7);
        for i in 0..7 {
            assert_eq!(left.key(i), (i + 1) as u32);
            assert_eq!(right.key(i), (i + 8) as u32);
        }
        assert_eq!(left.parent(), root);
        assert_eq!(right.parent(), root);
        assert_eq!(left.next_leaf(), Some(right.page_id));
        assert_eq!(right.next_leaf(), None);
        Ok(())
    }

    #[test]
    fn test_first_split_dump() -> Result<()> {
        let dir = tempdir()?;
        let mut pager = open_pager(&dir, 100)?;
        let root = BTree::create(&mut pager)?;
        let keys: Vec<u32> = (1..=14).collect();
        let root = insert_all(&mut pager, root, &keys)?;

        let mut expected = String::from("- internal (size 1)\n");
        expected.push_str(" - leaf (size 7)\n");
        for i in 1..=7 {
            expected.push_str(&format!("  - {}\n", i));
        }
        expected.push_str(" - key 7\n");
        expected.push_str(" - leaf (size 7)\n");
        for i in 8..=14 {
            expected.push_str(&format!("  - {}\n", i));
        }

        let mut tree = BTree::new(&mut pager, root);
        assert_eq!(tree.dump()?, expected);
        Ok(())
    }

    #[test]
    fn test_out_of_order_tree_shape() -> Result<()> {
        let dir = tempdir()?;
        let mut pager = open_pager(&dir, 100)?;
        let root = BTree::create(&mut pager)?;
        let keys = [
            18u32, 7, 10, 29, 23, 4, 14, 30, 15, 26, 22, 19, 2, 1, 21, 11, 6, 20, 5, 8, 9, 3, 12,
            27, 17, 16, 13, 24, 25, 28,
        ];
        let root = insert_all(&mut pager, root, &keys)?;

        let root_node = InternalPage::load(&mut pager, root)?;
        assert_eq!(root_node.num_keys(), 3);
        assert_eq!(
            (root_node.key(0), root_node.key(1), root_node.key(2)),
            (7, 15, 22)
        );

        let leaf_pages = [
            root_node.child(0),
            root_node.child(1),
            root_node.child(2),
            root_node.right_child(),
        ];
        let expected_contents: [&[u32]; 4] = [
            &[1, 2, 3, 4, 5, 6, 7],
            &[8, 9, 10, 11, 12, 13, 14, 15],
            &[16, 17, 18, 19, 20, 21, 22],
            &[23, 24, 25, 26, 27, 28, 29, 30],
        ];
        for (page, expected) in leaf_pages.iter().zip(expected_contents) {
            let leaf = LeafPage::load(&mut pager, *page)?;
            assert_eq!(leaf.num_cells(), expected.len());
            for (i, key) in expected.iter().enumerate() {
                assert_eq!(leaf.key(i), *key);
            }
            assert_eq!(leaf.parent(), root);
        }

        assert_eq!(collect_keys(&mut pager, root)?, (1..=30).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_split_fails_cleanly_when_out_of_pages() -> Result<()> {
        let dir = tempdir()?;
        let mut pager = open_pager(&dir, 1)?;
        let root = BTree::create(&mut pager)?;
        let keys: Vec<u32> = (1..=13).collect();
        let root = insert_all(&mut pager, root, &keys)?;

        // The 14th insert needs a sibling and a new root: two pages over the
        // limit of one.
        let mut tree = BTree::new(&mut pager, root);
        let result = tree.insert(14, &row(14));
        assert!(matches!(
            result,
            Err(BTreeError::Storage(StorageError::PageLimitReached { .. }))
        ));

        // Nothing was mutated
        assert_eq!(collect_keys(&mut pager, root)?, (1..=13).collect::<Vec<_>>());
        let leaf = LeafPage::load(&mut pager, root)?;
        assert!(leaf.is_root());
        assert_eq!(leaf.num_cells(), 13);
        Ok(())
    }

    #[test]
    fn test_internal_root_split() -> Result<()> {
        let dir = tempdir()?;
        let mut pager = open_pager(&dir, 600)?;
        let root = BTree::create(&mut pager)?;

        // Sequential inserts grow a leaf every seven keys past the first
        // split; the 512th leaf overflows a 510-key internal root.
        let keys: Vec<u32> = (1..=3600).collect();
        let root = insert_all(&mut pager, root, &keys)?;

        let root_node = InternalPage::load(&mut pager, root)?;
        assert!(root_node.is_root());
        assert_eq!(root_node.num_keys(), 1);

        let left = InternalPage::load(&mut pager, root_node.child(0))?;
        let right = InternalPage::load(&mut pager, root_node.right_child())?;
        assert_eq!(left.num_keys(), INTERNAL_LEFT_SPLIT_COUNT);
        assert_eq!(left.parent(), root);
        assert_eq!(right.parent(), root);

        // Parent pointers of migrated children follow the split
        let sample = right.child(0);
        let sample_leaf = LeafPage::load(&mut pager, sample)?;
        assert_eq!(sample_leaf.parent(), right.page_id);

        // The separator routes correctly: everything at or below it lives
        // under the left child.
        let boundary = root_node.key(0);
        let mut tree = BTree::new(&mut pager, root);
        let at = tree.find(boundary)?;
        let just_after = tree.find(boundary + 1)?;
        assert_ne!(at.page, just_after.page);

        assert_eq!(
            collect_keys(&mut pager, root)?,
            (1..=3600).collect::<Vec<_>>()
        );
        Ok(())
    }

    #[test]
    fn test_descending_inserts_survive_internal_root_split() -> Result<()> {
        let dir = tempdir()?;
        let mut pager = open_pager(&dir, 600)?;
        let root = BTree::create(&mut pager)?;

        // Descending order routes every leaf split through child 0, so the
        // full root splits with its insertion point in the retained half.
        let keys: Vec<u32> = (1..=3600).rev().collect();
        let root = insert_all(&mut pager, root, &keys)?;

        let root_node = InternalPage::load(&mut pager, root)?;
        assert!(root_node.is_root());
        assert_eq!(root_node.num_keys(), 1);
        let left = InternalPage::load(&mut pager, root_node.child(0))?;
        let right = InternalPage::load(&mut pager, root_node.right_child())?;
        assert_eq!(left.num_keys(), 257);
        assert_eq!(right.num_keys(), 255);

        // Every key stays reachable by descent, so re-inserting anywhere in
        // the range is refused.
        let separator = root_node.key(0);
        let mut tree = BTree::new(&mut pager, root);
        for key in [1, 24, separator, separator + 1, 3600] {
            let result = tree.insert(key, &row(key));
            assert!(matches!(result, Err(BTreeError::DuplicateKey(k)) if k == key));
        }

        assert_eq!(
            collect_keys(&mut pager, root)?,
            (1..=3600).collect::<Vec<_>>()
        );
        Ok(())
    }
}
