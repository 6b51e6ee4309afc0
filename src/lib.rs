pub mod catalog;
pub mod config;
pub mod database;
pub mod file;
pub mod record;

pub use catalog::{Catalog, CatalogError, CatalogResult};
pub use config::{ConfigError, DbConfig, ReplacementPolicy};
pub use database::{Database, DatabaseError, DatabaseResult};
pub use file::{BufferManager, DiskManager, FileError, FileResult, PageId};
pub use record::{
    ColumnDef, CompareOp, Condition, DataType, Record, RecordError, RecordId, RecordIterator,
    RecordResult, Relation, RelationScanner, TableSchema, Value,
};
