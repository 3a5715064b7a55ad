//! Positions within the tree and the lazy forward scan built on them.

use crate::access::btree::BTreeResult;
use crate::access::row::Row;
use crate::storage::page::LeafPage;
use crate::storage::pager::Pager;
use crate::storage::PageId;

/// A position in some leaf: page, cell index, and whether the scan has run
/// off the end of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub page: PageId,
    pub cell: usize,
    pub end_of_table: bool,
}

impl Cursor {
    /// Row stored at the cursor position.
    pub fn row(&self, pager: &mut Pager) -> BTreeResult<Row> {
        let leaf = LeafPage::load(pager, self.page)?;
        Ok(leaf.row(self.cell))
    }

    /// Moves one cell forward, following the leaf's sibling link at the end
    /// of a page. Sets `end_of_table` when the last leaf is exhausted.
    pub fn advance(&mut self, pager: &mut Pager) -> BTreeResult<()> {
        let leaf = LeafPage::load(pager, self.page)?;
        self.cell += 1;
        if self.cell >= leaf.num_cells() {
            match leaf.next_leaf() {
                Some(next) => {
                    self.page = next;
                    self.cell = 0;
                }
                None => self.end_of_table = true,
            }
        }
        Ok(())
    }
}

/// Lazy ascending scan over every row. Finite and non-restartable: each
/// `next_row` yields one row and moves the cursor.
pub struct Scan<'a> {
    pager: &'a mut Pager,
    cursor: Cursor,
}

impl<'a> Scan<'a> {
    pub fn new(pager: &'a mut Pager, cursor: Cursor) -> Self {
        Self { pager, cursor }
    }

    pub fn next_row(&mut self) -> BTreeResult<Option<Row>> {
        if self.cursor.end_of_table {
            return Ok(None);
        }
        let row = self.cursor.row(self.pager)?;
        self.cursor.advance(self.pager)?;
        Ok(Some(row))
    }
}
