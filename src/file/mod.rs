mod buffer_manager;
mod disk_manager;
mod error;
mod page_id;

pub use buffer_manager::BufferManager;
pub use disk_manager::DiskManager;
pub use error::{FileError, FileResult};
pub use page_id::PageId;

/// Size in bytes of the link header at the start of every header and data page
/// (two page identifiers of 8 bytes each)
pub const LINK_HEADER_SIZE: usize = 16;

/// Default page size in bytes (4KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;
