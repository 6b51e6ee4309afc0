//! Heap file organisation of a table.
//!
//! A relation owns one header page holding the heads of two doubly-linked
//! lists of data pages: pages with at least one free slot and pages with
//! none. Every data page is on exactly one of the two lists.

use ahash::AHashSet;

use super::condition::{Condition, matches_all};
use super::error::{RecordError, RecordResult};
use super::page::{DataPage, HeaderPage, SlotLayout};
use super::record::{Record, RecordId, SlotId};
use super::schema::{ColumnDef, TableSchema};
use super::value::Value;
use crate::file::{BufferManager, PageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageList {
    Free,
    Full,
}

/// A table stored as a heap file
#[derive(Debug, Clone)]
pub struct Relation {
    name: String,
    schema: TableSchema,
    header_page_id: PageId,
    layout: SlotLayout,
}

impl Relation {
    /// Create a new relation, allocating and initializing its header page
    pub fn create(name: impl Into<String>, columns: Vec<ColumnDef>, bm: &mut BufferManager) -> RecordResult<Self> {
        let name = name.into();
        let schema = TableSchema::new(columns);
        let layout = SlotLayout::for_schema(bm.page_size(), &schema)?;

        let header_page_id = bm.disk_mut().allocate()?;
        bm.with_page_mut(header_page_id, |data| {
            data.fill(0);
            HeaderPage::new(data).init();
        })?;

        log::debug!(
            "created relation {} (header {}, {} slots of {} bytes)",
            name,
            header_page_id,
            layout.slot_count,
            layout.record_size
        );

        Ok(Self {
            name,
            schema,
            header_page_id,
            layout,
        })
    }

    /// Rebuild a relation whose header page already exists
    pub fn open(
        name: impl Into<String>,
        columns: Vec<ColumnDef>,
        header_page_id: PageId,
        page_size: usize,
    ) -> RecordResult<Self> {
        let schema = TableSchema::new(columns);
        let layout = SlotLayout::for_schema(page_size, &schema)?;
        Ok(Self {
            name: name.into(),
            schema,
            header_page_id,
            layout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn columns(&self) -> &[ColumnDef] {
        self.schema.columns()
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    pub fn layout(&self) -> SlotLayout {
        self.layout
    }

    /// Allocate a data page, zero it and push it at the head of the free list
    pub fn add_page(&self, bm: &mut BufferManager) -> RecordResult<PageId> {
        let page_id = bm.disk_mut().allocate()?;
        let layout = self.layout;
        let linked = bm
            .with_page_mut(page_id, |data| DataPage::new(data, layout).init())
            .map_err(RecordError::from)
            .and_then(|_| self.push_front(bm, page_id, PageList::Free));
        if let Err(err) = linked {
            bm.disk_mut().deallocate(page_id);
            return Err(err);
        }
        log::debug!("relation {}: added data page {}", self.name, page_id);
        Ok(page_id)
    }

    /// Insert a record into the first free slot of the free-list head page.
    ///
    /// A page found full is moved to the full list and the next free page is
    /// tried; a new page is added when the free list is empty.
    pub fn insert(&self, bm: &mut BufferManager, record: &Record) -> RecordResult<RecordId> {
        self.schema.validate_record(record.values())?;

        loop {
            let free_head = self.head(bm, PageList::Free)?;
            let page_id = if free_head.is_valid() {
                free_head
            } else {
                self.add_page(bm)?
            };

            let data = bm.acquire(page_id)?;
            let mut page = DataPage::new(data, self.layout);
            let outcome = match page.find_free_slot() {
                Some(slot_id) => match page.write_record(&self.schema, slot_id, record) {
                    Ok(()) => {
                        page.set_slot_used(slot_id, true);
                        Ok(Some((slot_id, page.is_full())))
                    }
                    Err(e) => Err(e),
                },
                None => Ok(None),
            };
            bm.release(page_id, matches!(outcome, Ok(Some(_))));

            match outcome? {
                Some((slot_id, now_full)) => {
                    if now_full {
                        self.move_page(bm, page_id, PageList::Free, PageList::Full)?;
                    }
                    return Ok(RecordId::new(page_id, slot_id));
                }
                None => {
                    log::warn!(
                        "relation {}: page {} on the free list has no free slot",
                        self.name,
                        page_id
                    );
                    self.move_page(bm, page_id, PageList::Free, PageList::Full)?;
                }
            }
        }
    }

    /// Data pages: the free list followed by the full list
    pub fn data_pages(&self, bm: &mut BufferManager) -> RecordResult<Vec<PageId>> {
        let mut pages = self.list_pages(bm, PageList::Free)?;
        pages.extend(self.list_pages(bm, PageList::Full)?);
        Ok(pages)
    }

    /// Pages with at least one free slot
    pub fn free_list_pages(&self, bm: &mut BufferManager) -> RecordResult<Vec<PageId>> {
        self.list_pages(bm, PageList::Free)
    }

    /// Pages with no free slot
    pub fn full_list_pages(&self, bm: &mut BufferManager) -> RecordResult<Vec<PageId>> {
        self.list_pages(bm, PageList::Full)
    }

    /// Header page plus every data page
    pub fn all_pages(&self, bm: &mut BufferManager) -> RecordResult<Vec<PageId>> {
        let mut pages = vec![self.header_page_id];
        pages.extend(self.data_pages(bm)?);
        Ok(pages)
    }

    /// Every record together with its location
    pub fn scan(&self, bm: &mut BufferManager) -> RecordResult<Vec<(RecordId, Record)>> {
        let mut results = Vec::new();
        for page_id in self.data_pages(bm)? {
            let records = self.read_page_records(bm, page_id)?;
            results.extend(
                records
                    .into_iter()
                    .map(|(slot_id, record)| (RecordId::new(page_id, slot_id), record)),
            );
        }
        Ok(results)
    }

    /// Every record of the relation
    pub fn get_all_records(&self, bm: &mut BufferManager) -> RecordResult<Vec<Record>> {
        Ok(self.scan(bm)?.into_iter().map(|(_, record)| record).collect())
    }

    /// Number of occupied slots across all data pages
    pub fn record_count(&self, bm: &mut BufferManager) -> RecordResult<usize> {
        let layout = self.layout;
        let mut count = 0;
        for page_id in self.data_pages(bm)? {
            count += bm.with_page(page_id, |data| DataPage::new(data, layout).used_count())?;
        }
        Ok(count)
    }

    /// Read the record stored at `rid`
    pub fn get_record(&self, bm: &mut BufferManager, rid: RecordId) -> RecordResult<Record> {
        self.check_slot(rid)?;
        let layout = self.layout;
        bm.with_page(rid.page_id, |data| {
            let page = DataPage::new(data, layout);
            if !page.is_slot_used(rid.slot_id) {
                return Err(RecordError::InvalidSlot(rid.page_id, rid.slot_id));
            }
            page.read_record(&self.schema, rid.slot_id)
        })?
    }

    /// Free the slot at `rid`
    pub fn delete_record(&self, bm: &mut BufferManager, rid: RecordId) -> RecordResult<()> {
        self.check_slot(rid)?;

        let data = bm.acquire(rid.page_id)?;
        let mut page = DataPage::new(data, self.layout);
        let used = page.is_slot_used(rid.slot_id);
        let was_full = page.is_full();
        if used {
            page.set_slot_used(rid.slot_id, false);
        }
        bm.release(rid.page_id, used);

        if !used {
            return Err(RecordError::InvalidSlot(rid.page_id, rid.slot_id));
        }
        if was_full {
            self.move_page(bm, rid.page_id, PageList::Full, PageList::Free)?;
        }
        Ok(())
    }

    /// Overwrite the record stored at `rid`
    pub fn update_record(&self, bm: &mut BufferManager, rid: RecordId, record: &Record) -> RecordResult<()> {
        self.check_slot(rid)?;
        self.schema.validate_record(record.values())?;

        let layout = self.layout;
        let data = bm.acquire(rid.page_id)?;
        let mut page = DataPage::new(data, layout);
        let outcome = if page.is_slot_used(rid.slot_id) {
            page.write_record(&self.schema, rid.slot_id, record)
        } else {
            Err(RecordError::InvalidSlot(rid.page_id, rid.slot_id))
        };
        bm.release(rid.page_id, outcome.is_ok());
        outcome
    }

    /// Delete every record matching all `conditions`, returning how many
    /// were removed. Freed slots become reusable by `insert`.
    pub fn delete(&self, bm: &mut BufferManager, conditions: &[Condition]) -> RecordResult<usize> {
        let mut deleted = 0;

        for page_id in self.data_pages(bm)? {
            let data = bm.acquire(page_id)?;
            let mut page = DataPage::new(data, self.layout);
            let was_full = page.is_full();

            let slots: Vec<SlotId> = page.used_slots().collect();
            let mut removed = 0;
            for slot_id in slots {
                match page.read_record(&self.schema, slot_id) {
                    Ok(record) if matches_all(conditions, &record) => {
                        page.set_slot_used(slot_id, false);
                        removed += 1;
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("relation {}: skipping slot {} of {}: {}", self.name, slot_id, page_id, e),
                }
            }
            bm.release(page_id, removed > 0);

            if was_full && removed > 0 {
                self.move_page(bm, page_id, PageList::Full, PageList::Free)?;
            }
            deleted += removed;
        }

        log::debug!("relation {}: deleted {} records", self.name, deleted);
        Ok(deleted)
    }

    /// Set column `column` to `value` in every record matching all
    /// `conditions`, returning how many were changed.
    ///
    /// The value is checked against the column type before any page is
    /// touched.
    pub fn update(
        &self,
        bm: &mut BufferManager,
        conditions: &[Condition],
        column: usize,
        value: &Value,
    ) -> RecordResult<usize> {
        self.schema.column_checked(column)?.validate_value(value)?;

        let mut updated = 0;
        for page_id in self.data_pages(bm)? {
            let data = bm.acquire(page_id)?;
            let mut page = DataPage::new(data, self.layout);

            let slots: Vec<SlotId> = page.used_slots().collect();
            let mut changed = 0;
            for slot_id in slots {
                let mut record = match page.read_record(&self.schema, slot_id) {
                    Ok(record) => record,
                    Err(e) => {
                        log::warn!("relation {}: skipping slot {} of {}: {}", self.name, slot_id, page_id, e);
                        continue;
                    }
                };
                if !matches_all(conditions, &record) {
                    continue;
                }
                record.set(column, value.clone());
                match page.write_record(&self.schema, slot_id, &record) {
                    Ok(()) => changed += 1,
                    Err(e) => log::warn!("relation {}: cannot rewrite slot {} of {}: {}", self.name, slot_id, page_id, e),
                }
            }
            bm.release(page_id, changed > 0);
            updated += changed;
        }

        log::debug!("relation {}: updated {} records", self.name, updated);
        Ok(updated)
    }

    /// Decode every occupied slot of a page; undecodable slots are skipped
    fn read_page_records(
        &self,
        bm: &mut BufferManager,
        page_id: PageId,
    ) -> RecordResult<Vec<(SlotId, Record)>> {
        let layout = self.layout;
        let records = bm.with_page(page_id, |data| {
            let page = DataPage::new(data, layout);
            page.used_slots()
                .filter_map(|slot_id| match page.read_record(&self.schema, slot_id) {
                    Ok(record) => Some((slot_id, record)),
                    Err(e) => {
                        log::warn!("relation {}: skipping slot {} of {}: {}", self.name, slot_id, page_id, e);
                        None
                    }
                })
                .collect::<Vec<_>>()
        })?;
        Ok(records)
    }

    fn check_slot(&self, rid: RecordId) -> RecordResult<()> {
        if !rid.page_id.is_valid() || rid.slot_id >= self.layout.slot_count {
            return Err(RecordError::InvalidSlot(rid.page_id, rid.slot_id));
        }
        Ok(())
    }

    pub(crate) fn head(&self, bm: &mut BufferManager, list: PageList) -> RecordResult<PageId> {
        let head = bm.with_page(self.header_page_id, |data| {
            let header = HeaderPage::new(data);
            match list {
                PageList::Free => header.free_head(),
                PageList::Full => header.full_head(),
            }
        })?;
        Ok(head)
    }

    fn set_head(&self, bm: &mut BufferManager, list: PageList, page_id: PageId) -> RecordResult<()> {
        bm.with_page_mut(self.header_page_id, |data| {
            let mut header = HeaderPage::new(data);
            match list {
                PageList::Free => header.set_free_head(page_id),
                PageList::Full => header.set_full_head(page_id),
            }
        })?;
        Ok(())
    }

    fn list_pages(&self, bm: &mut BufferManager, list: PageList) -> RecordResult<Vec<PageId>> {
        let layout = self.layout;
        let mut pages = Vec::new();
        let mut seen = AHashSet::new();
        let mut page_id = self.head(bm, list)?;

        while page_id.is_valid() {
            if !seen.insert(page_id) {
                return Err(RecordError::Deserialization(format!(
                    "relation {}: page list loops back to {}",
                    self.name, page_id
                )));
            }
            pages.push(page_id);
            page_id = bm.with_page(page_id, |data| DataPage::new(data, layout).next())?;
        }
        Ok(pages)
    }

    /// Detach a page from `list`, relinking its neighbours
    fn unlink(&self, bm: &mut BufferManager, page_id: PageId, list: PageList) -> RecordResult<()> {
        let layout = self.layout;
        let (prev, next) = bm.with_page(page_id, |data| {
            let page = DataPage::new(data, layout);
            (page.prev(), page.next())
        })?;

        if prev.is_valid() {
            bm.with_page_mut(prev, |data| DataPage::new(data, layout).set_next(next))?;
        } else {
            self.set_head(bm, list, next)?;
        }
        if next.is_valid() {
            bm.with_page_mut(next, |data| DataPage::new(data, layout).set_prev(prev))?;
        }
        Ok(())
    }

    /// Make a detached page the new head of `list`
    fn push_front(&self, bm: &mut BufferManager, page_id: PageId, list: PageList) -> RecordResult<()> {
        let layout = self.layout;
        let old_head = self.head(bm, list)?;

        bm.with_page_mut(page_id, |data| {
            let mut page = DataPage::new(data, layout);
            page.set_prev(PageId::INVALID);
            page.set_next(old_head);
        })?;
        if old_head.is_valid() {
            bm.with_page_mut(old_head, |data| DataPage::new(data, layout).set_prev(page_id))?;
        }
        self.set_head(bm, list, page_id)
    }

    fn move_page(&self, bm: &mut BufferManager, page_id: PageId, from: PageList, to: PageList) -> RecordResult<()> {
        self.unlink(bm, page_id, from)?;
        self.push_front(bm, page_id, to)?;
        log::debug!("relation {}: moved page {} from {:?} to {:?} list", self.name, page_id, from, to);
        Ok(())
    }
}
