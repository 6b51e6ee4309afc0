use lru::LruCache;

use super::disk_manager::DiskManager;
use super::error::{FileError, FileResult};
use super::page_id::PageId;
use crate::config::{DbConfig, ReplacementPolicy};

/// One slot of the buffer pool
struct Frame {
    /// The page contents
    data: Vec<u8>,
    /// Page currently held, `None` when the frame is empty
    page_id: Option<PageId>,
    /// Number of outstanding acquisitions
    pin_count: u32,
    /// Whether the contents differ from disk
    dirty: bool,
}

impl Frame {
    fn new(page_size: usize) -> Self {
        Self {
            data: vec![0u8; page_size],
            page_id: None,
            pin_count: 0,
            dirty: false,
        }
    }

    fn reset(&mut self) {
        self.page_id = None;
        self.pin_count = 0;
        self.dirty = false;
    }
}

/// Fixed-size pool of page frames with pin counting and LRU/MRU eviction.
///
/// Every `acquire` must be matched by exactly one `release` for the same
/// page; a frame with a non-zero pin count is never chosen for eviction.
pub struct BufferManager {
    /// Underlying disk manager
    disk: DiskManager,
    /// The frames themselves; their count never changes
    frames: Vec<Frame>,
    /// Resident pages mapped to their frame index. Acquiring a page promotes
    /// its entry, so iteration order is most to least recently acquired.
    page_table: LruCache<PageId, usize>,
    /// Active replacement policy
    policy: ReplacementPolicy,
}

impl BufferManager {
    /// Create a buffer manager with `capacity` frames
    pub fn new(disk: DiskManager, capacity: usize, policy: ReplacementPolicy) -> Self {
        let page_size = disk.page_size();
        Self {
            disk,
            frames: (0..capacity).map(|_| Frame::new(page_size)).collect(),
            page_table: LruCache::unbounded(),
            policy,
        }
    }

    /// Create a buffer manager sized by the startup configuration
    pub fn from_config(disk: DiskManager, config: &DbConfig) -> Self {
        Self::new(disk, config.buffer_count, config.policy)
    }

    /// Get a reference to the disk manager
    pub fn disk(&self) -> &DiskManager {
        &self.disk
    }

    /// Get a mutable reference to the disk manager
    pub fn disk_mut(&mut self) -> &mut DiskManager {
        &mut self.disk
    }

    /// Page size in bytes
    pub fn page_size(&self) -> usize {
        self.disk.page_size()
    }

    /// Pin a page and return its contents, loading it from disk if necessary.
    ///
    /// Fails with `BufferPoolFull` when the page is not resident and every
    /// frame is pinned.
    pub fn acquire(&mut self, page_id: PageId) -> FileResult<&mut [u8]> {
        // Hit: `get` also marks the page as most recently used
        if let Some(&frame_idx) = self.page_table.get(&page_id) {
            let frame = &mut self.frames[frame_idx];
            frame.pin_count += 1;
            return Ok(frame.data.as_mut_slice());
        }

        let frame_idx = self.pick_victim().ok_or_else(|| {
            log::error!("cannot load {}: all {} frames are pinned", page_id, self.frames.len());
            FileError::BufferPoolFull
        })?;
        self.evict_frame(frame_idx)?;

        // The frame stays empty if the read fails
        self.disk.read(page_id, &mut self.frames[frame_idx].data)?;

        let frame = &mut self.frames[frame_idx];
        frame.page_id = Some(page_id);
        frame.pin_count = 1;
        frame.dirty = false;
        self.page_table.put(page_id, frame_idx);

        Ok(frame.data.as_mut_slice())
    }

    /// Unpin a page; `dirty` marks it modified (it is never cleared here)
    pub fn release(&mut self, page_id: PageId, dirty: bool) {
        let Some(&frame_idx) = self.page_table.peek(&page_id) else {
            log::warn!("release of {} which is not in the buffer pool", page_id);
            return;
        };

        let frame = &mut self.frames[frame_idx];
        if frame.pin_count == 0 {
            log::warn!("release of {} which is not pinned", page_id);
        } else {
            frame.pin_count -= 1;
        }
        if dirty {
            frame.dirty = true;
        }
    }

    /// Acquire a page, read it through `f`, then release it clean
    pub fn with_page<R>(
        &mut self,
        page_id: PageId,
        f: impl FnOnce(&[u8]) -> R,
    ) -> FileResult<R> {
        let data = self.acquire(page_id)?;
        let result = f(data);
        self.release(page_id, false);
        Ok(result)
    }

    /// Acquire a page, modify it through `f`, then release it dirty
    pub fn with_page_mut<R>(
        &mut self,
        page_id: PageId,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> FileResult<R> {
        let data = self.acquire(page_id)?;
        let result = f(data);
        self.release(page_id, true);
        Ok(result)
    }

    /// Read access to a page the caller already holds pinned
    pub fn pinned_page(&self, page_id: PageId) -> Option<&[u8]> {
        let &frame_idx = self.page_table.peek(&page_id)?;
        let frame = &self.frames[frame_idx];
        (frame.pin_count > 0).then_some(frame.data.as_slice())
    }

    /// Write a page back to disk if it is dirty, keeping it cached
    pub fn flush_page(&mut self, page_id: PageId) -> FileResult<()> {
        if let Some(&frame_idx) = self.page_table.peek(&page_id) {
            let frame = &mut self.frames[frame_idx];
            if frame.dirty {
                self.disk.write(page_id, &frame.data)?;
                frame.dirty = false;
            }
        }
        Ok(())
    }

    /// Write back every dirty page and empty the whole pool
    ///
    /// Frames are evicted one at a time, so a failed write leaves that frame
    /// and every later one resident and mapped.
    pub fn flush_all(&mut self) -> FileResult<()> {
        for frame_idx in 0..self.frames.len() {
            self.evict_frame(frame_idx)?;
        }

        // Sync all files to ensure data is persisted to disk
        self.disk.sync_all()?;
        Ok(())
    }

    /// Switch the replacement policy
    pub fn set_policy(&mut self, policy: ReplacementPolicy) {
        log::debug!("replacement policy {} -> {}", self.policy, policy);
        self.policy = policy;
    }

    /// Switch the replacement policy by name; unknown names keep the current
    /// policy. Returns whether the policy was applied.
    pub fn set_policy_str(&mut self, policy: &str) -> bool {
        match policy.parse::<ReplacementPolicy>() {
            Ok(policy) => {
                self.set_policy(policy);
                true
            }
            Err(err) => {
                log::warn!("{}, keeping {}", err, self.policy);
                false
            }
        }
    }

    /// Get the active replacement policy
    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    /// Number of frames in the pool
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Get the number of pages currently in the buffer pool
    pub fn buffer_pool_size(&self) -> usize {
        self.page_table.len()
    }

    /// Check if a page is in the buffer pool
    pub fn is_page_cached(&self, page_id: PageId) -> bool {
        self.page_table.contains(&page_id)
    }

    /// Pin count of a resident page
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.page_table
            .peek(&page_id)
            .map(|&frame_idx| self.frames[frame_idx].pin_count)
    }

    /// Check if a resident page is dirty
    pub fn is_dirty(&self, page_id: PageId) -> bool {
        self.page_table
            .peek(&page_id)
            .is_some_and(|&frame_idx| self.frames[frame_idx].dirty)
    }

    /// Get the number of dirty pages in the buffer pool
    pub fn dirty_page_count(&self) -> usize {
        self.frames.iter().filter(|f| f.dirty).count()
    }

    /// Choose the frame to reuse: an empty frame first, otherwise the
    /// unpinned frame picked by the policy
    fn pick_victim(&self) -> Option<usize> {
        if let Some(frame_idx) = self.frames.iter().position(|f| f.page_id.is_none()) {
            return Some(frame_idx);
        }

        let mut unpinned = self
            .page_table
            .iter()
            .map(|(_, &frame_idx)| frame_idx)
            .filter(|&frame_idx| self.frames[frame_idx].pin_count == 0);

        match self.policy {
            ReplacementPolicy::Mru => unpinned.next(),
            ReplacementPolicy::Lru => unpinned.last(),
        }
    }

    /// Write a frame back if dirty and make it empty
    fn evict_frame(&mut self, frame_idx: usize) -> FileResult<()> {
        let frame = &mut self.frames[frame_idx];
        if let Some(page_id) = frame.page_id {
            if frame.dirty {
                self.disk.write(page_id, &frame.data)?;
            }
            self.page_table.pop(&page_id);
            log::debug!("evicted {} from frame {}", page_id, frame_idx);
        }
        frame.reset();
        Ok(())
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        // Flush all dirty pages when the buffer manager is dropped
        if let Err(err) = self.flush_all() {
            log::error!("failed to flush buffer pool on drop: {}", err);
        }
    }
}
