//! Common node header shared by leaf and internal pages.
//!
//! Layout (little-endian):
//!
//! | field       | offset | size |
//! |-------------|--------|------|
//! | node kind   | 0      | 1    |
//! | is_root     | 1      | 1    |
//! | parent page | 2      | 4    |

use crate::storage::page::PageId;
use crate::storage::PAGE_SIZE;

pub const KIND_OFFSET: usize = 0;
pub const IS_ROOT_OFFSET: usize = 1;
pub const PARENT_OFFSET: usize = 2;
pub const COMMON_HEADER_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Internal,
    Leaf,
}

impl NodeKind {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => NodeKind::Internal,
            _ => NodeKind::Leaf,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            NodeKind::Internal => 0,
            NodeKind::Leaf => 1,
        }
    }
}

pub fn kind(data: &[u8; PAGE_SIZE]) -> NodeKind {
    NodeKind::from_byte(data[KIND_OFFSET])
}

pub fn set_kind(data: &mut [u8; PAGE_SIZE], kind: NodeKind) {
    data[KIND_OFFSET] = kind.to_byte();
}

pub fn is_root(data: &[u8; PAGE_SIZE]) -> bool {
    data[IS_ROOT_OFFSET] != 0
}

pub fn set_is_root(data: &mut [u8; PAGE_SIZE], is_root: bool) {
    data[IS_ROOT_OFFSET] = is_root as u8;
}

pub fn parent(data: &[u8; PAGE_SIZE]) -> PageId {
    PageId(u32::from_le_bytes([
        data[PARENT_OFFSET],
        data[PARENT_OFFSET + 1],
        data[PARENT_OFFSET + 2],
        data[PARENT_OFFSET + 3],
    ]))
}

pub fn set_parent(data: &mut [u8; PAGE_SIZE], parent: PageId) {
    data[PARENT_OFFSET..PARENT_OFFSET + 4].copy_from_slice(&parent.0.to_le_bytes());
}
