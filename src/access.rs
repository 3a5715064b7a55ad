//! Access layer: logical rows over raw pages.
//!
//! This module provides the two abstractions the rest of the engine works
//! with:
//!
//! - **Row**: the fixed-width record type with its byte codec
//! - **BTree**: key-ordered storage of rows across leaf and internal pages
//!
//! The access layer owns all tree-shape maintenance (splits, parent
//! pointers, sibling links) so higher layers deal in logical records rather
//! than raw bytes.

pub mod btree;
pub mod row;

pub use btree::{BTree, BTreeError, BTreeResult, Cursor, Scan};
pub use row::{Row, RowError};
