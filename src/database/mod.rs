use ahash::AHashMap;
use csv::{ReaderBuilder, Trim};
use std::path::Path;
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError, TableMetadata};
use crate::config::{ConfigError, DbConfig, ReplacementPolicy};
use crate::file::{BufferManager, DiskManager};
use crate::record::{
    ColumnDef, CompareOp, Condition, ProjectOperator, Record, RecordId, RecordIterator,
    RelationScanner, Relation, SelectOperator, Value,
};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    #[error("Record error: {0}")]
    RecordError(#[from] crate::record::RecordError),

    #[error("File error: {0}")]
    FileError(#[from] crate::file::FileError),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Owns the storage managers and every table of one data directory.
///
/// The catalog is read on `open` and written back on `shutdown` (or drop).
pub struct Database {
    config: DbConfig,
    buffer_manager: BufferManager,
    tables: AHashMap<String, Relation>,
    closed: bool,
}

impl Database {
    /// Open the data directory named by `config`, loading its catalog if present
    pub fn open(config: DbConfig) -> DatabaseResult<Self> {
        config.validate()?;

        let mut disk = DiskManager::from_config(&config);
        disk.initialize()?;

        let mut tables = AHashMap::new();
        if Catalog::exists(&config.db_path) {
            let catalog = Catalog::load(&config.db_path)?;
            for entry in &catalog.tables {
                let relation = Relation::open(
                    entry.name.clone(),
                    entry.column_defs()?,
                    entry.header_page,
                    config.page_size,
                )?;
                tables.insert(entry.name.clone(), relation);
            }
            disk.restore_free_pages(catalog.free_pages);
        }

        let buffer_manager = BufferManager::from_config(disk, &config);
        log::info!(
            "opened database at {} with {} tables",
            config.db_path.display(),
            tables.len()
        );

        Ok(Self {
            config,
            buffer_manager,
            tables,
            closed: false,
        })
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn buffer_manager(&self) -> &BufferManager {
        &self.buffer_manager
    }

    pub fn buffer_manager_mut(&mut self) -> &mut BufferManager {
        &mut self.buffer_manager
    }

    /// Switch the buffer pool's replacement policy
    pub fn set_replacement_policy(&mut self, policy: ReplacementPolicy) {
        self.buffer_manager.set_policy(policy);
    }

    pub fn create_table(&mut self, name: &str, columns: Vec<ColumnDef>) -> DatabaseResult<()> {
        if self.tables.contains_key(name) {
            return Err(DatabaseError::TableExists(name.to_string()));
        }
        let relation = Relation::create(name, columns, &mut self.buffer_manager)?;
        self.tables.insert(name.to_string(), relation);
        log::info!("created table {}", name);
        Ok(())
    }

    /// Drop a table and return its pages to the recycle pool
    pub fn drop_table(&mut self, name: &str) -> DatabaseResult<()> {
        let relation = lookup(&self.tables, name)?;
        let pages = relation.all_pages(&mut self.buffer_manager)?;
        for page_id in &pages {
            self.buffer_manager.disk_mut().deallocate(*page_id);
        }
        self.tables.remove(name);
        log::info!("dropped table {} ({} pages recycled)", name, pages.len());
        Ok(())
    }

    pub fn drop_all_tables(&mut self) -> DatabaseResult<()> {
        for name in self.table_names() {
            self.drop_table(&name)?;
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> DatabaseResult<&Relation> {
        lookup(&self.tables, name)
    }

    /// Table names in sorted order
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn tables(&self) -> impl Iterator<Item = &Relation> {
        self.tables.values()
    }

    /// Build a condition on a column addressed by name
    pub fn condition(
        &self,
        table: &str,
        column: &str,
        op: CompareOp,
        literal: &str,
    ) -> DatabaseResult<Condition> {
        let relation = self.table(table)?;
        Ok(Condition::by_name(relation.schema(), column, op, literal)?)
    }

    pub fn insert(&mut self, table: &str, values: Vec<Value>) -> DatabaseResult<RecordId> {
        let relation = lookup(&self.tables, table)?;
        Ok(relation.insert(&mut self.buffer_manager, &Record::new(values))?)
    }

    /// Insert several rows, stopping at the first invalid one
    pub fn insert_many(&mut self, table: &str, rows: Vec<Vec<Value>>) -> DatabaseResult<usize> {
        let relation = lookup(&self.tables, table)?;

        let mut inserted = 0;
        for values in rows {
            relation.insert(&mut self.buffer_manager, &Record::new(values))?;
            inserted += 1;
        }
        log::debug!("inserted {} records into {}", inserted, table);
        Ok(inserted)
    }

    /// Append every row of a comma separated file to a table.
    ///
    /// Fields are converted with the column types; rows with the wrong field
    /// count or a value the schema rejects are skipped with a warning.
    /// Returns the number of rows inserted.
    pub fn append_csv(&mut self, table: &str, path: impl AsRef<Path>) -> DatabaseResult<usize> {
        let relation = lookup(&self.tables, table)?;
        let path = path.as_ref();

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_path(path)?;

        let columns = relation.columns();
        let mut inserted = 0;
        for (line, row) in reader.records().enumerate() {
            let row = row?;
            if row.len() != columns.len() {
                log::warn!(
                    "{}:{}: expected {} fields, got {}",
                    path.display(),
                    line + 1,
                    columns.len(),
                    row.len()
                );
                continue;
            }

            let values: Option<Vec<Value>> = columns
                .iter()
                .zip(row.iter())
                .map(|(column, field)| column.data_type.parse_literal(field))
                .collect();
            let Some(values) = values else {
                log::warn!("{}:{}: unparsable field, row skipped", path.display(), line + 1);
                continue;
            };
            if let Err(err) = relation.schema().validate_record(&values) {
                log::warn!("{}:{}: {}, row skipped", path.display(), line + 1, err);
                continue;
            }

            relation.insert(&mut self.buffer_manager, &Record::new(values))?;
            inserted += 1;
        }

        log::info!("appended {} records from {} into {}", inserted, path.display(), table);
        Ok(inserted)
    }

    /// Records matching every condition, remapped to `projection` (all
    /// columns when empty)
    pub fn select(
        &mut self,
        table: &str,
        conditions: Vec<Condition>,
        projection: Vec<usize>,
    ) -> DatabaseResult<Vec<Record>> {
        let relation = lookup(&self.tables, table)?;

        let scanner = RelationScanner::new(relation, &mut self.buffer_manager);
        let select = SelectOperator::new(Box::new(scanner), conditions);
        let mut project = ProjectOperator::new(Box::new(select), projection);
        let records = project.collect_records();
        project.close();
        Ok(records?)
    }

    pub fn get_all_records(&mut self, table: &str) -> DatabaseResult<Vec<Record>> {
        let relation = lookup(&self.tables, table)?;
        Ok(relation.get_all_records(&mut self.buffer_manager)?)
    }

    pub fn record_count(&mut self, table: &str) -> DatabaseResult<usize> {
        let relation = lookup(&self.tables, table)?;
        Ok(relation.record_count(&mut self.buffer_manager)?)
    }

    /// Delete matching records, returning how many were removed
    pub fn delete(&mut self, table: &str, conditions: &[Condition]) -> DatabaseResult<usize> {
        let relation = lookup(&self.tables, table)?;
        Ok(relation.delete(&mut self.buffer_manager, conditions)?)
    }

    /// Set one column of matching records, returning how many were changed
    pub fn update(
        &mut self,
        table: &str,
        conditions: &[Condition],
        column: usize,
        value: &Value,
    ) -> DatabaseResult<usize> {
        let relation = lookup(&self.tables, table)?;
        Ok(relation.update(&mut self.buffer_manager, conditions, column, value)?)
    }

    /// Catalog describing the current tables and recycle pool
    pub fn catalog(&self) -> Catalog {
        let mut catalog = Catalog::new();
        for name in self.table_names() {
            if let Some(relation) = self.tables.get(&name) {
                catalog.add_table(TableMetadata::from_relation(relation));
            }
        }
        catalog.free_pages = self.buffer_manager.disk().free_pages().to_vec();
        catalog
    }

    /// Flush every page and persist the catalog
    pub fn flush(&mut self) -> DatabaseResult<()> {
        self.buffer_manager.flush_all()?;
        self.catalog().save(&self.config.db_path)?;
        Ok(())
    }

    /// Flush, save the catalog and close the data files
    pub fn shutdown(mut self) -> DatabaseResult<()> {
        self.close()
    }

    fn close(&mut self) -> DatabaseResult<()> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.buffer_manager.disk_mut().shutdown()?;
        self.closed = true;
        log::info!("closed database at {}", self.config.db_path.display());
        Ok(())
    }
}

fn lookup<'t>(tables: &'t AHashMap<String, Relation>, name: &str) -> DatabaseResult<&'t Relation> {
    tables
        .get(name)
        .ok_or_else(|| DatabaseError::TableNotFound(name.to_string()))
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("failed to close database: {}", e);
        }
    }
}
