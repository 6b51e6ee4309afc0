use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{FileError, FileResult};
use super::page_id::PageId;
use crate::config::DbConfig;

/// Owns the data files and hands out fixed-size pages.
///
/// Each file index maps to `Data{idx}.bin` inside the data directory; page
/// `p` of a file lives at byte offset `p * page_size`.
pub struct DiskManager {
    /// Directory holding the data files
    db_path: PathBuf,
    /// Size of every page in bytes
    page_size: usize,
    /// Number of file indices accepted by read/write
    max_file_count: usize,
    /// Map from file index to open file
    open_files: HashMap<i32, File>,
    /// Deallocated pages waiting for reuse (most recent last)
    free_pages: Vec<PageId>,
}

impl DiskManager {
    /// Create a disk manager for the given data directory
    pub fn new<P: AsRef<Path>>(db_path: P, page_size: usize, max_file_count: usize) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            page_size,
            max_file_count,
            open_files: HashMap::new(),
            free_pages: Vec::new(),
        }
    }

    /// Create a disk manager from the startup configuration
    pub fn from_config(config: &DbConfig) -> Self {
        Self::new(&config.db_path, config.page_size, config.max_file_count)
    }

    /// Create the data directory if it doesn't exist
    pub fn initialize(&mut self) -> FileResult<()> {
        if !self.db_path.exists() {
            std::fs::create_dir_all(&self.db_path)?;
            log::info!("created data directory {}", self.db_path.display());
        }
        Ok(())
    }

    /// Sync and close every open data file
    pub fn shutdown(&mut self) -> FileResult<()> {
        self.sync_all()?;
        self.open_files.clear();
        Ok(())
    }

    /// Get the page size in bytes
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Get the data directory
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Path of the data file for a file index
    pub fn data_file_path(&self, file_idx: i32) -> PathBuf {
        self.db_path.join(format!("Data{}.bin", file_idx))
    }

    /// Allocate a page, reusing the most recently deallocated one if any
    pub fn allocate(&mut self) -> FileResult<PageId> {
        if let Some(page_id) = self.free_pages.pop() {
            log::debug!("reusing deallocated page {}", page_id);
            return Ok(page_id);
        }

        // New pages always go to the first data file
        let file_idx = 0;
        let page_size = self.page_size as u64;
        let file = self.open_file(file_idx, true)?;

        let page_count = file.metadata()?.len().div_ceil(page_size);
        file.set_len((page_count + 1) * page_size)?;

        let page_idx = i32::try_from(page_count)
            .map_err(|_| io::Error::other("data file exceeds addressable page count"))?;
        let page_id = PageId::new(file_idx, page_idx);
        log::debug!("allocated new page {}", page_id);
        Ok(page_id)
    }

    /// Return a page to the recycle pool; its bytes are left untouched
    pub fn deallocate(&mut self, page_id: PageId) {
        if !page_id.is_valid() {
            log::warn!("ignoring deallocation of invalid page {}", page_id);
            return;
        }
        if self.free_pages.contains(&page_id) {
            log::warn!("page {} is already deallocated", page_id);
            return;
        }
        self.free_pages.push(page_id);
    }

    /// Read a whole page into `buffer`
    pub fn read(&mut self, page_id: PageId, buffer: &mut [u8]) -> FileResult<()> {
        self.check_buffer(buffer.len())?;
        self.check_page_id(page_id)?;

        let page_size = self.page_size as u64;
        let offset = page_id.page_idx as u64 * page_size;
        let file = self.open_file(page_id.file_idx, false)?;

        if offset + page_size > file.metadata()?.len() {
            return Err(FileError::PageNotFound(page_id));
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buffer)?;
        Ok(())
    }

    /// Write a whole page from `buffer`, creating the file if needed
    pub fn write(&mut self, page_id: PageId, buffer: &[u8]) -> FileResult<()> {
        self.check_buffer(buffer.len())?;
        self.check_page_id(page_id)?;

        let offset = page_id.page_idx as u64 * self.page_size as u64;
        let file = self.open_file(page_id.file_idx, true)?;

        // Writing past the end extends the file
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buffer)?;
        Ok(())
    }

    /// Get the number of pages in a data file (0 if the file doesn't exist)
    pub fn page_count(&mut self, file_idx: i32) -> FileResult<usize> {
        if !self.open_files.contains_key(&file_idx) && !self.data_file_path(file_idx).exists() {
            return Ok(0);
        }
        let page_size = self.page_size as u64;
        let file = self.open_file(file_idx, false)?;
        Ok(file.metadata()?.len().div_ceil(page_size) as usize)
    }

    /// Pages currently waiting in the recycle pool, oldest first
    pub fn free_pages(&self) -> &[PageId] {
        &self.free_pages
    }

    /// Replace the recycle pool, e.g. with a snapshot loaded from the catalog
    pub fn restore_free_pages(&mut self, pages: Vec<PageId>) {
        self.free_pages = pages.into_iter().filter(PageId::is_valid).collect();
    }

    /// Sync all open files to disk
    pub fn sync_all(&mut self) -> FileResult<()> {
        for file in self.open_files.values_mut() {
            file.sync_data()?;
        }
        Ok(())
    }

    fn open_file(&mut self, file_idx: i32, create: bool) -> FileResult<&mut File> {
        let path = self.data_file_path(file_idx);
        match self.open_files.entry(file_idx) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                if !create && !path.exists() {
                    return Err(FileError::FileNotFound(path.display().to_string()));
                }
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(create)
                    .truncate(false)
                    .open(&path)?;
                Ok(entry.insert(file))
            }
        }
    }

    fn check_page_id(&self, page_id: PageId) -> FileResult<()> {
        if !page_id.is_valid() || page_id.file_idx as usize >= self.max_file_count {
            return Err(FileError::InvalidPageId(page_id));
        }
        Ok(())
    }

    fn check_buffer(&self, len: usize) -> FileResult<()> {
        if len != self.page_size {
            return Err(FileError::InvalidPageSize {
                expected: self.page_size,
                actual: len,
            });
        }
        Ok(())
    }
}
