use super::error::{RecordError, RecordResult};
use super::value::{DataType, Value};

/// Column descriptor: a name and a declared type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDef {
    /// Create a new column definition
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Largest encoded size of this column in bytes
    pub fn max_size(&self) -> usize {
        self.data_type.max_encoded_size()
    }

    /// Check that `value` can be stored in this column
    pub fn validate_value(&self, value: &Value) -> RecordResult<()> {
        if !value.matches(&self.data_type) {
            return Err(RecordError::TypeMismatch {
                expected: self.data_type.to_string(),
                actual: format!("{:?}", value),
            });
        }
        if let DataType::Varchar(limit) = self.data_type
            && let Some(length) = value.char_len()
            && length > limit
        {
            return Err(RecordError::ValueTooLong {
                column: self.name.clone(),
                length,
                limit,
            });
        }
        Ok(())
    }
}

/// Ordered column list of a table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
    record_size: usize,
}

impl TableSchema {
    /// Create a new table schema
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        let record_size = columns.iter().map(|c| c.max_size()).sum();
        Self {
            columns,
            record_size,
        }
    }

    /// Get all columns
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Get column count
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get a specific column
    pub fn column(&self, idx: usize) -> Option<&ColumnDef> {
        self.columns.get(idx)
    }

    /// Find column index by name
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Maximum encoded record size in bytes, the slot size of a data page
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Look up a column, failing with `InvalidColumn`
    pub fn column_checked(&self, idx: usize) -> RecordResult<&ColumnDef> {
        self.columns.get(idx).ok_or(RecordError::InvalidColumn {
            index: idx,
            count: self.columns.len(),
        })
    }

    /// Validate a record against this schema
    pub fn validate_record(&self, values: &[Value]) -> RecordResult<()> {
        if values.len() != self.columns.len() {
            return Err(RecordError::SchemaMismatch(format!(
                "Expected {} columns, got {}",
                self.columns.len(),
                values.len()
            )));
        }

        for (value, col) in values.iter().zip(&self.columns) {
            col.validate_value(value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnDef::new("id", DataType::Int),
            ColumnDef::new("code", DataType::Char(3)),
            ColumnDef::new("name", DataType::Varchar(10)),
            ColumnDef::new("score", DataType::Float),
        ])
    }

    #[test]
    fn test_record_size() {
        let schema = create_test_schema();
        assert_eq!(schema.column_count(), 4);
        // int + char(3) + varchar(10) + float
        assert_eq!(schema.record_size(), 4 + 6 + (4 + 20) + 4);
    }

    #[test]
    fn test_find_column() {
        let schema = create_test_schema();
        assert_eq!(schema.find_column("id"), Some(0));
        assert_eq!(schema.find_column("score"), Some(3));
        assert_eq!(schema.find_column("nonexistent"), None);
    }

    #[test]
    fn test_validate_record_success() {
        let schema = create_test_schema();
        let values = vec![
            Value::Int(1),
            Value::Text("toolong".to_string()), // CHAR truncates, not an error
            Value::Text("Alice".to_string()),
            Value::Float(95.5),
        ];
        assert!(schema.validate_record(&values).is_ok());
    }

    #[test]
    fn test_validate_record_type_mismatch() {
        let schema = create_test_schema();
        let values = vec![
            Value::Text("not_an_int".to_string()),
            Value::Text("abc".to_string()),
            Value::Text("Alice".to_string()),
            Value::Float(95.5),
        ];
        assert!(matches!(
            schema.validate_record(&values),
            Err(RecordError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_record_varchar_too_long() {
        let schema = create_test_schema();
        let values = vec![
            Value::Int(1),
            Value::Text("abc".to_string()),
            Value::Text("abcdefghijk".to_string()),
            Value::Float(1.0),
        ];
        match schema.validate_record(&values) {
            Err(RecordError::ValueTooLong {
                column,
                length,
                limit,
            }) => {
                assert_eq!(column, "name");
                assert_eq!(length, 11);
                assert_eq!(limit, 10);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_record_column_count_mismatch() {
        let schema = create_test_schema();
        let values = vec![Value::Int(1)];
        assert!(matches!(
            schema.validate_record(&values),
            Err(RecordError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_column_checked() {
        let schema = create_test_schema();
        assert_eq!(schema.column_checked(1).unwrap().name, "code");
        assert!(matches!(
            schema.column_checked(4),
            Err(RecordError::InvalidColumn { index: 4, count: 4 })
        ));
    }
}
