use std::fmt;

use super::error::RecordResult;
use super::schema::TableSchema;
use super::value::Value;
use crate::file::PageId;

/// Slot index within a data page
pub type SlotId = usize;

/// Storage location of a record (page + slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

/// A single record (row); its schema comes from the owning table
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    /// Create a new record
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Get the number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if record is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by index
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Get all values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the record, returning its values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Set a value by index
    pub fn set(&mut self, idx: usize, value: Value) {
        if idx < self.values.len() {
            self.values[idx] = value;
        }
    }

    /// New record built from the given column indices; indices out of
    /// range are skipped
    pub fn project(&self, indices: &[usize]) -> Record {
        Record::new(
            indices
                .iter()
                .filter_map(|&idx| self.values.get(idx).cloned())
                .collect(),
        )
    }

    /// Encode this record column by column starting at `offset`.
    ///
    /// Returns the offset just past the last written byte.
    pub fn write_to(&self, schema: &TableSchema, buf: &mut [u8], offset: usize) -> RecordResult<usize> {
        schema.validate_record(&self.values)?;

        let mut pos = offset;
        for (value, col) in self.values.iter().zip(schema.columns()) {
            pos = value.encode(&col.data_type, buf, pos)?;
        }
        Ok(pos)
    }

    /// Decode a record laid out by `write_to`, returning it with the
    /// offset just past the consumed bytes
    pub fn read_from(schema: &TableSchema, buf: &[u8], offset: usize) -> RecordResult<(Self, usize)> {
        let mut values = Vec::with_capacity(schema.column_count());
        let mut pos = offset;
        for col in schema.columns() {
            let (value, next) = Value::decode(&col.data_type, buf, pos)?;
            values.push(value);
            pos = next;
        }
        Ok((Record { values }, pos))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, " ; ")?;
            }
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}
