use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::file::PageId;
use crate::record::{ColumnDef, DataType, Relation};

/// Current on-disk catalog format
pub const CATALOG_VERSION: u32 = 1;

/// Catalog file name inside the data directory
pub const CATALOG_FILE: &str = "catalog.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unsupported catalog version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Column {column} of table {table} has unknown type {column_type}")]
    InvalidColumnType {
        table: String,
        column: String,
        column_type: String,
    },
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String, // "INT", "FLOAT", "CHAR(n)", "VARCHAR(n)"
}

impl ColumnMetadata {
    pub fn from_column(column: &ColumnDef) -> Self {
        Self {
            name: column.name.clone(),
            column_type: column.data_type.to_string(),
        }
    }
}

/// Persisted description of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
    pub header_page: PageId,
}

impl TableMetadata {
    pub fn from_relation(relation: &Relation) -> Self {
        Self {
            name: relation.name().to_string(),
            columns: relation.columns().iter().map(ColumnMetadata::from_column).collect(),
            header_page: relation.header_page_id(),
        }
    }

    /// Column definitions with their types parsed back
    pub fn column_defs(&self) -> CatalogResult<Vec<ColumnDef>> {
        self.columns
            .iter()
            .map(|c| {
                let data_type: DataType =
                    c.column_type
                        .parse()
                        .map_err(|_| CatalogError::InvalidColumnType {
                            table: self.name.clone(),
                            column: c.name.clone(),
                            column_type: c.column_type.clone(),
                        })?;
                Ok(ColumnDef::new(c.name.clone(), data_type))
            })
            .collect()
    }
}

/// Snapshot of every table plus the disk manager's recycle pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub version: u32,
    pub tables: Vec<TableMetadata>,
    #[serde(default)]
    pub free_pages: Vec<PageId>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            version: CATALOG_VERSION,
            tables: Vec::new(),
            free_pages: Vec::new(),
        }
    }

    /// Location of the catalog file for a data directory
    pub fn path(db_path: &Path) -> PathBuf {
        db_path.join(CATALOG_FILE)
    }

    pub fn exists(db_path: &Path) -> bool {
        Self::path(db_path).exists()
    }

    pub fn load(db_path: &Path) -> CatalogResult<Self> {
        let content = fs::read_to_string(Self::path(db_path))?;
        let catalog: Catalog = serde_json::from_str(&content)?;
        if catalog.version != CATALOG_VERSION {
            return Err(CatalogError::UnsupportedVersion {
                found: catalog.version,
                expected: CATALOG_VERSION,
            });
        }
        log::info!(
            "loaded catalog with {} tables and {} recycled pages",
            catalog.tables.len(),
            catalog.free_pages.len()
        );
        Ok(catalog)
    }

    pub fn save(&self, db_path: &Path) -> CatalogResult<()> {
        let content = serde_json::to_string_pretty(&self)?;
        fs::write(Self::path(db_path), content)?;
        log::info!("saved catalog with {} tables", self.tables.len());
        Ok(())
    }

    pub fn add_table(&mut self, metadata: TableMetadata) {
        self.tables.retain(|t| t.name != metadata.name);
        self.tables.push(metadata);
    }

    pub fn get_table(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_env() -> TempDir {
        tempfile::tempdir().unwrap()
    }

    fn sample_table() -> TableMetadata {
        TableMetadata {
            name: "Personne".to_string(),
            columns: vec![
                ColumnMetadata::from_column(&ColumnDef::new("Nom", DataType::Varchar(10))),
                ColumnMetadata::from_column(&ColumnDef::new("Age", DataType::Int)),
            ],
            header_page: PageId::new(0, 0),
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = setup_test_env();
        let mut catalog = Catalog::new();
        catalog.add_table(sample_table());
        catalog.free_pages = vec![PageId::new(0, 4), PageId::new(0, 2)];

        assert!(!Catalog::exists(temp_dir.path()));
        catalog.save(temp_dir.path()).unwrap();
        assert!(Catalog::exists(temp_dir.path()));

        let loaded = Catalog::load(temp_dir.path()).unwrap();
        assert_eq!(loaded, catalog);
        assert_eq!(
            loaded.get_table("Personne").unwrap().column_defs().unwrap(),
            vec![
                ColumnDef::new("Nom", DataType::Varchar(10)),
                ColumnDef::new("Age", DataType::Int)
            ]
        );
    }

    #[test]
    fn test_column_type_text() {
        let json = serde_json::to_string(&sample_table()).unwrap();
        assert!(json.contains(r#""type":"VARCHAR(10)""#));
    }

    #[test]
    fn test_add_table_replaces_same_name() {
        let mut catalog = Catalog::new();
        catalog.add_table(sample_table());
        let mut other = sample_table();
        other.header_page = PageId::new(0, 9);
        catalog.add_table(other);

        assert_eq!(catalog.tables.len(), 1);
        assert_eq!(catalog.get_table("Personne").unwrap().header_page, PageId::new(0, 9));
        assert!(catalog.get_table("Other").is_none());
    }

    #[test]
    fn test_unsupported_version() {
        let temp_dir = setup_test_env();
        let mut catalog = Catalog::new();
        catalog.version = 99;
        catalog.save(temp_dir.path()).unwrap();

        assert!(matches!(
            Catalog::load(temp_dir.path()),
            Err(CatalogError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_invalid_column_type() {
        let mut table = sample_table();
        table.columns[1].column_type = "BLOB".to_string();
        assert!(matches!(
            table.column_defs(),
            Err(CatalogError::InvalidColumnType { .. })
        ));
    }

    #[test]
    fn test_load_missing_catalog() {
        let temp_dir = setup_test_env();
        assert!(matches!(
            Catalog::load(temp_dir.path()),
            Err(CatalogError::IoError(_))
        ));
    }
}
