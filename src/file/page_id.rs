use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a page by data file index and page index within that file.
///
/// `(-1, -1)` is the "no page" sentinel used to terminate page lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId {
    pub file_idx: i32,
    pub page_idx: i32,
}

impl PageId {
    /// Sentinel meaning "no page" / end of list
    pub const INVALID: PageId = PageId {
        file_idx: -1,
        page_idx: -1,
    };

    /// Encoded size in bytes (two 4-byte integers)
    pub const SIZE: usize = 8;

    pub fn new(file_idx: i32, page_idx: i32) -> Self {
        Self { file_idx, page_idx }
    }

    /// A page id is valid when neither component is negative
    pub fn is_valid(&self) -> bool {
        self.file_idx >= 0 && self.page_idx >= 0
    }

    /// Read a page id stored big-endian at `offset`
    pub fn read_from(buf: &[u8], offset: usize) -> Self {
        let file_idx = i32::from_be_bytes([
            buf[offset],
            buf[offset + 1],
            buf[offset + 2],
            buf[offset + 3],
        ]);
        let page_idx = i32::from_be_bytes([
            buf[offset + 4],
            buf[offset + 5],
            buf[offset + 6],
            buf[offset + 7],
        ]);
        Self { file_idx, page_idx }
    }

    /// Write this page id big-endian at `offset`
    pub fn write_to(&self, buf: &mut [u8], offset: usize) {
        buf[offset..offset + 4].copy_from_slice(&self.file_idx.to_be_bytes());
        buf[offset + 4..offset + 8].copy_from_slice(&self.page_idx.to_be_bytes());
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageId({}, {})", self.file_idx, self.page_idx)
    }
}
