//! Storage layer implementation for soledb.
//!
//! This module provides the foundation for persistent data storage using a
//! page-based architecture. Key components:
//!
//! - **Page**: Fixed-size (4KB) blocks of data, the basic unit of I/O
//! - **PageManager**: Handles reading/writing whole pages to disk
//! - **Pager**: In-memory arena of page buffers, loaded lazily and flushed
//!   back in page order on close
//! - **Leaf/Internal pages**: byte-level node layouts for the B+Tree
//!
//! Pages are allocated monotonically and never freed; a page number is a
//! stable index into the pager for the lifetime of the database file.

pub mod disk;
pub mod error;
pub mod page;
pub mod pager;

pub use disk::{PageManager, PAGE_SIZE};
pub use error::{StorageError, StorageResult};
pub use page::PageId;
pub use pager::Pager;
