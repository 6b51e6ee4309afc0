//! Pull-based record operators: a streaming relation scan plus selection and
//! projection decorators.

use super::condition::{Condition, matches_all};
use super::error::RecordResult;
use super::page::DataPage;
use super::record::{Record, SlotId};
use super::relation::{PageList, Relation};
use crate::file::{BufferManager, FileError, PageId};

/// A restartable stream of records
pub trait RecordIterator {
    /// Next record, `None` at end of stream
    fn next_record(&mut self) -> RecordResult<Option<Record>>;

    /// Release held resources; the stream yields nothing until `reset`
    fn close(&mut self);

    /// Restart production from the first record
    fn reset(&mut self) -> RecordResult<()>;

    /// Drain the remaining records
    fn collect_records(&mut self) -> RecordResult<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Streams a relation's records page by page.
///
/// At most one data page is pinned at a time; it is released once its slots
/// are exhausted, after its `next` link has been read.
pub struct RelationScanner<'a> {
    relation: &'a Relation,
    bm: &'a mut BufferManager,
    /// Page currently pinned
    current: Option<PageId>,
    /// Next slot to examine in `current`
    slot: SlotId,
    /// Next page to visit on the list being walked
    pending: PageId,
    list: PageList,
    started: bool,
    done: bool,
}

impl<'a> RelationScanner<'a> {
    pub fn new(relation: &'a Relation, bm: &'a mut BufferManager) -> Self {
        Self {
            relation,
            bm,
            current: None,
            slot: 0,
            pending: PageId::INVALID,
            list: PageList::Free,
            started: false,
            done: false,
        }
    }

    /// Page held pinned by the scan, if any
    pub fn pinned_page_id(&self) -> Option<PageId> {
        self.current
    }

    fn unpin(&mut self) {
        if let Some(page_id) = self.current.take() {
            self.bm.release(page_id, false);
        }
    }
}

impl RecordIterator for RelationScanner<'_> {
    fn next_record(&mut self) -> RecordResult<Option<Record>> {
        if self.done {
            return Ok(None);
        }
        if !self.started {
            self.pending = self.relation.head(self.bm, PageList::Free)?;
            self.list = PageList::Free;
            self.started = true;
        }

        let layout = self.relation.layout();
        loop {
            if let Some(page_id) = self.current {
                let data = self
                    .bm
                    .pinned_page(page_id)
                    .ok_or(FileError::PageNotFound(page_id))?;
                let page = DataPage::new(data, layout);

                while self.slot < layout.slot_count {
                    let slot_id = self.slot;
                    self.slot += 1;
                    if !page.is_slot_used(slot_id) {
                        continue;
                    }
                    match page.read_record(self.relation.schema(), slot_id) {
                        Ok(record) => return Ok(Some(record)),
                        Err(e) => log::warn!("scan of {}: skipping slot {} of {}: {}", self.relation.name(), slot_id, page_id, e),
                    }
                }

                self.pending = page.next();
                self.unpin();
            }

            if !self.pending.is_valid() {
                if self.list == PageList::Full {
                    self.done = true;
                    return Ok(None);
                }
                self.list = PageList::Full;
                self.pending = self.relation.head(self.bm, PageList::Full)?;
                continue;
            }

            self.bm.acquire(self.pending)?;
            self.current = Some(self.pending);
            self.slot = 0;
        }
    }

    fn close(&mut self) {
        self.unpin();
        self.done = true;
    }

    fn reset(&mut self) -> RecordResult<()> {
        self.unpin();
        self.slot = 0;
        self.pending = PageId::INVALID;
        self.list = PageList::Free;
        self.started = false;
        self.done = false;
        Ok(())
    }
}

impl Drop for RelationScanner<'_> {
    fn drop(&mut self) {
        self.unpin();
    }
}

/// Passes through records that satisfy every condition
pub struct SelectOperator<'a> {
    child: Box<dyn RecordIterator + 'a>,
    conditions: Vec<Condition>,
}

impl<'a> SelectOperator<'a> {
    pub fn new(child: Box<dyn RecordIterator + 'a>, conditions: Vec<Condition>) -> Self {
        Self { child, conditions }
    }
}

impl RecordIterator for SelectOperator<'_> {
    fn next_record(&mut self) -> RecordResult<Option<Record>> {
        while let Some(record) = self.child.next_record()? {
            if matches_all(&self.conditions, &record) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn reset(&mut self) -> RecordResult<()> {
        self.child.reset()
    }
}

/// Remaps each record to the chosen column indices
pub struct ProjectOperator<'a> {
    child: Box<dyn RecordIterator + 'a>,
    columns: Vec<usize>,
}

impl<'a> ProjectOperator<'a> {
    /// An empty column list passes records through unchanged
    pub fn new(child: Box<dyn RecordIterator + 'a>, columns: Vec<usize>) -> Self {
        Self { child, columns }
    }
}

impl RecordIterator for ProjectOperator<'_> {
    fn next_record(&mut self) -> RecordResult<Option<Record>> {
        let Some(record) = self.child.next_record()? else {
            return Ok(None);
        };
        if self.columns.is_empty() {
            return Ok(Some(record));
        }
        Ok(Some(record.project(&self.columns)))
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn reset(&mut self) -> RecordResult<()> {
        self.child.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplacementPolicy;
    use crate::file::DiskManager;
    use crate::record::{ColumnDef, CompareOp, DataType, Value};
    use tempfile::TempDir;

    fn setup_test_env(capacity: usize) -> (TempDir, BufferManager) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut disk = DiskManager::new(temp_dir.path(), 128, 4);
        disk.initialize().unwrap();
        let bm = BufferManager::new(disk, capacity, ReplacementPolicy::Lru);
        (temp_dir, bm)
    }

    /// 6 slots per page with a 128-byte page
    fn filled_relation(bm: &mut BufferManager, count: i32) -> Relation {
        let relation = Relation::create(
            "R",
            vec![
                ColumnDef::new("Nom", DataType::Varchar(4)),
                ColumnDef::new("Age", DataType::Int),
            ],
            bm,
        )
        .unwrap();
        for i in 0..count {
            let record = Record::new(vec![Value::Text(format!("n{}", i % 10)), Value::Int(i)]);
            relation.insert(bm, &record).unwrap();
        }
        relation
    }

    fn ages(records: &[Record]) -> Vec<i32> {
        let mut ages: Vec<i32> = records
            .iter()
            .filter_map(|r| match r.get(1) {
                Some(Value::Int(age)) => Some(*age),
                _ => None,
            })
            .collect();
        ages.sort();
        ages
    }

    #[test]
    fn test_scanner_streams_both_lists() {
        let (_temp_dir, mut bm) = setup_test_env(4);
        let relation = filled_relation(&mut bm, 15);
        assert_eq!(relation.full_list_pages(&mut bm).unwrap().len(), 2);
        assert_eq!(relation.free_list_pages(&mut bm).unwrap().len(), 1);

        let records = RelationScanner::new(&relation, &mut bm).collect_records().unwrap();
        assert_eq!(ages(&records), (0..15).collect::<Vec<_>>());
    }

    #[test]
    fn test_scanner_with_single_frame() {
        // One frame is enough since the scan never pins two pages
        let (_temp_dir, mut bm) = setup_test_env(4);
        let relation = filled_relation(&mut bm, 20);
        bm.flush_all().unwrap();

        let disk = DiskManager::new(bm.disk().db_path(), 128, 4);
        let mut small = BufferManager::new(disk, 1, ReplacementPolicy::Lru);
        let mut scanner = RelationScanner::new(&relation, &mut small);

        let mut count = 0;
        while scanner.next_record().unwrap().is_some() {
            assert!(scanner.pinned_page_id().is_some());
            count += 1;
        }
        assert_eq!(count, 20);
        assert_eq!(scanner.pinned_page_id(), None);
    }

    #[test]
    fn test_scanner_empty_relation() {
        let (_temp_dir, mut bm) = setup_test_env(4);
        let relation = filled_relation(&mut bm, 0);
        let mut scanner = RelationScanner::new(&relation, &mut bm);
        assert_eq!(scanner.next_record().unwrap(), None);
        assert_eq!(scanner.next_record().unwrap(), None);
    }

    #[test]
    fn test_scanner_close_and_reset() {
        let (_temp_dir, mut bm) = setup_test_env(4);
        let relation = filled_relation(&mut bm, 8);

        {
            let mut scanner = RelationScanner::new(&relation, &mut bm);
            assert!(scanner.next_record().unwrap().is_some());
            let pinned = scanner.pinned_page_id().unwrap();

            scanner.close();
            assert_eq!(scanner.pinned_page_id(), None);
            assert_eq!(scanner.next_record().unwrap(), None);

            scanner.reset().unwrap();
            assert_eq!(scanner.collect_records().unwrap().len(), 8);

            // Dropping mid-page releases the pin
            scanner.reset().unwrap();
            scanner.next_record().unwrap();
            assert_eq!(scanner.pinned_page_id(), Some(pinned));
        }
        for page_id in relation.all_pages(&mut bm).unwrap() {
            assert!(matches!(bm.pin_count(page_id), None | Some(0)));
        }
    }

    #[test]
    fn test_select_operator() {
        let (_temp_dir, mut bm) = setup_test_env(4);
        let relation = filled_relation(&mut bm, 30);

        let scanner = RelationScanner::new(&relation, &mut bm);
        let mut select = SelectOperator::new(
            Box::new(scanner),
            vec![
                Condition::new(1, CompareOp::GtEq, "10"),
                Condition::new(0, CompareOp::Eq, "n3"),
            ],
        );
        assert_eq!(ages(&select.collect_records().unwrap()), vec![13, 23]);

        select.reset().unwrap();
        assert_eq!(select.collect_records().unwrap().len(), 2);
    }

    #[test]
    fn test_select_without_conditions() {
        let (_temp_dir, mut bm) = setup_test_env(4);
        let relation = filled_relation(&mut bm, 9);
        let scanner = RelationScanner::new(&relation, &mut bm);
        let mut select = SelectOperator::new(Box::new(scanner), Vec::new());
        assert_eq!(select.collect_records().unwrap().len(), 9);
    }

    #[test]
    fn test_project_operator() {
        let (_temp_dir, mut bm) = setup_test_env(4);
        let relation = filled_relation(&mut bm, 3);

        let scanner = RelationScanner::new(&relation, &mut bm);
        let select = SelectOperator::new(Box::new(scanner), vec![Condition::new(1, CompareOp::Eq, "2")]);
        let mut project = ProjectOperator::new(Box::new(select), vec![1, 1, 0, 7]);
        let records = project.collect_records().unwrap();
        assert_eq!(
            records,
            vec![Record::new(vec![
                Value::Int(2),
                Value::Int(2),
                Value::Text("n2".to_string())
            ])]
        );

        project.reset().unwrap();
        project.close();
        assert_eq!(project.next_record().unwrap(), None);
    }

    #[test]
    fn test_project_passthrough() {
        let (_temp_dir, mut bm) = setup_test_env(4);
        let relation = filled_relation(&mut bm, 2);
        let scanner = RelationScanner::new(&relation, &mut bm);
        let mut project = ProjectOperator::new(Box::new(scanner), Vec::new());
        let records = project.collect_records().unwrap();
        assert!(records.iter().all(|r| r.len() == 2));
    }
}
