mod condition;
mod error;
mod iterator;
mod page;
mod record;
mod relation;
mod schema;
mod value;

pub use condition::{CompareOp, Condition, matches_all};
pub use error::{RecordError, RecordResult};
pub use iterator::{ProjectOperator, RecordIterator, RelationScanner, SelectOperator};
pub use page::{DataPage, HeaderPage, SlotLayout};
pub use record::{Record, RecordId, SlotId};
pub use relation::Relation;
pub use schema::{ColumnDef, TableSchema};
pub use value::{CHAR_WIDTH, DataType, Value};
