pub mod internal_page;
pub mod leaf_page;
pub mod node;

/// Zero-based page number, the stable identity of a page within the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(pub u32);

pub use internal_page::InternalPage;
pub use leaf_page::LeafPage;
pub use node::NodeKind;
