//! Byte views over the two page kinds of a heap file.
//!
//! Header page: `[0, 8)` free-list head, `[8, 16)` full-list head.
//! Data page: `[0, 8)` prev link, `[8, 16)` next link, then one bytemap byte
//! per slot, then the fixed-size slots.

use super::error::{RecordError, RecordResult};
use super::record::{Record, SlotId};
use super::schema::TableSchema;
use crate::file::{LINK_HEADER_SIZE, PageId};

const SLOT_FREE: u8 = 0;
const SLOT_USED: u8 = 1;

/// Per-page geometry derived from a schema and the page size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    pub page_size: usize,
    pub record_size: usize,
    pub slot_count: usize,
}

impl SlotLayout {
    /// Compute the layout; fails with `RecordTooLarge` if not even one slot fits
    pub fn new(page_size: usize, record_size: usize) -> RecordResult<Self> {
        // One bytemap byte per slot
        let slot_count = page_size.saturating_sub(LINK_HEADER_SIZE) / (record_size + 1);
        if slot_count == 0 {
            return Err(RecordError::RecordTooLarge {
                record_size,
                page_size,
            });
        }
        Ok(Self {
            page_size,
            record_size,
            slot_count,
        })
    }

    pub fn for_schema(page_size: usize, schema: &TableSchema) -> RecordResult<Self> {
        Self::new(page_size, schema.record_size())
    }

    /// Byte offset of the first slot
    pub fn slots_offset(&self) -> usize {
        LINK_HEADER_SIZE + self.slot_count
    }

    /// Byte offset of a slot within the page
    pub fn slot_offset(&self, slot_id: SlotId) -> usize {
        self.slots_offset() + slot_id * self.record_size
    }
}

/// View over a table's header page
pub struct HeaderPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> HeaderPage<B> {
    pub fn new(data: B) -> Self {
        Self { data }
    }

    /// Head of the list of pages with at least one free slot
    pub fn free_head(&self) -> PageId {
        PageId::read_from(self.data.as_ref(), 0)
    }

    /// Head of the list of pages with no free slot
    pub fn full_head(&self) -> PageId {
        PageId::read_from(self.data.as_ref(), PageId::SIZE)
    }
}

impl<B: AsMut<[u8]>> HeaderPage<B> {
    /// Mark both lists empty
    pub fn init(&mut self) {
        let data = self.data.as_mut();
        PageId::INVALID.write_to(data, 0);
        PageId::INVALID.write_to(data, PageId::SIZE);
    }

    pub fn set_free_head(&mut self, page_id: PageId) {
        page_id.write_to(self.data.as_mut(), 0);
    }

    pub fn set_full_head(&mut self, page_id: PageId) {
        page_id.write_to(self.data.as_mut(), PageId::SIZE);
    }
}

/// View over a data page with a known slot layout
pub struct DataPage<B> {
    data: B,
    layout: SlotLayout,
}

impl<B: AsRef<[u8]>> DataPage<B> {
    pub fn new(data: B, layout: SlotLayout) -> Self {
        Self { data, layout }
    }

    pub fn prev(&self) -> PageId {
        PageId::read_from(self.data.as_ref(), 0)
    }

    pub fn next(&self) -> PageId {
        PageId::read_from(self.data.as_ref(), PageId::SIZE)
    }

    /// Whether a slot holds a record; slots past the end are never used
    pub fn is_slot_used(&self, slot_id: SlotId) -> bool {
        slot_id < self.layout.slot_count
            && self.data.as_ref()[LINK_HEADER_SIZE + slot_id] != SLOT_FREE
    }

    /// First free slot, `None` if the page is full
    pub fn find_free_slot(&self) -> Option<SlotId> {
        self.bytemap().iter().position(|&b| b == SLOT_FREE)
    }

    /// Occupied slots in ascending order
    pub fn used_slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.bytemap()
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b != SLOT_FREE)
            .map(|(slot_id, _)| slot_id)
    }

    pub fn used_count(&self) -> usize {
        self.bytemap().iter().filter(|&&b| b != SLOT_FREE).count()
    }

    pub fn is_full(&self) -> bool {
        self.find_free_slot().is_none()
    }

    /// Decode the record stored in a slot
    pub fn read_record(&self, schema: &TableSchema, slot_id: SlotId) -> RecordResult<Record> {
        let (record, _) = Record::read_from(schema, self.data.as_ref(), self.layout.slot_offset(slot_id))?;
        Ok(record)
    }

    fn bytemap(&self) -> &[u8] {
        &self.data.as_ref()[LINK_HEADER_SIZE..self.layout.slots_offset()]
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> DataPage<B> {
    /// Zero the page and clear both links
    pub fn init(&mut self) {
        let data = self.data.as_mut();
        data.fill(0);
        PageId::INVALID.write_to(data, 0);
        PageId::INVALID.write_to(data, PageId::SIZE);
    }

    pub fn set_prev(&mut self, page_id: PageId) {
        page_id.write_to(self.data.as_mut(), 0);
    }

    pub fn set_next(&mut self, page_id: PageId) {
        page_id.write_to(self.data.as_mut(), PageId::SIZE);
    }

    pub fn set_slot_used(&mut self, slot_id: SlotId, used: bool) {
        if slot_id < self.layout.slot_count {
            self.data.as_mut()[LINK_HEADER_SIZE + slot_id] = if used { SLOT_USED } else { SLOT_FREE };
        }
    }

    /// Encode a record into a slot; the bytemap is left untouched
    pub fn write_record(&mut self, schema: &TableSchema, slot_id: SlotId, record: &Record) -> RecordResult<()> {
        let offset = self.layout.slot_offset(slot_id);
        let end = record.write_to(schema, self.data.as_mut(), offset)?;
        debug_assert!(end - offset <= self.layout.record_size);
        Ok(())
    }
}
