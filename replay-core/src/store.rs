//! Keyed record lookup backing the replay sequencer.
//!
//! The record store stands in for the external tabular data source: a table
//! of captured rows addressed by integer index, each exposing a description
//! (`info`) and an optional serialized content blob (`message`). The CSV
//! implementation loads a capture file through Arrow's CSV reader.

use arrow::array::{Array, StringArray};
use arrow::csv::reader::Format;
use std::collections::HashMap;
use std::fs::File;
use std::io::Seek;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Default name of the description column in capture files.
pub const DEFAULT_INFO_COLUMN: &str = "Info";

/// Default name of the content column in capture files.
pub const DEFAULT_MESSAGE_COLUMN: &str = "Message";

/// Rows sampled for CSV schema inference.
const SCHEMA_INFERENCE_ROWS: usize = 100;

/// Errors that can occur while loading or querying a record store.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input/output operation failed.
    #[error("IO operation failed on path {path}: {source}")]
    IO {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Arrow CSV parsing error.
    #[error("CSV parsing failed: {source}")]
    Arrow {
        #[source]
        source: arrow::error::ArrowError,
    },
    /// Expected column was not present in the capture file.
    #[error("Column '{}' not found in capture file", _0)]
    MissingColumn(String),
    /// Column was present but not inferred as a string column.
    #[error("Column '{}' is not a string column", _0)]
    ColumnType(String),
    /// Required builder attribute was not provided.
    #[error("Missing required attribute: {}", _0)]
    MissingRequiredAttribute(String),
}

/// One row of the capture table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Human-readable description; a leading marker identifies publishable
    /// rows.
    pub info: String,
    /// Serialized content fragments, absent for rows without a body.
    pub message: Option<String>,
}

/// Keyed lookup into a capture table.
pub trait RecordStore: std::fmt::Debug + Send + Sync + 'static {
    /// Returns the record at `index`, if one exists.
    fn get(&self, index: usize) -> Option<Record>;
    /// Number of records available.
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sparse in-memory record store, used by tests and fixtures.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: HashMap<usize, Record>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record at the given index, replacing any existing one.
    pub fn insert(&mut self, index: usize, record: Record) {
        self.records.insert(index, record);
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, index: usize) -> Option<Record> {
        self.records.get(&index).cloned()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Record store loaded from a CSV capture file. Row order in the file
/// determines the lookup index.
#[derive(Debug)]
pub struct CsvRecordStore {
    records: Vec<Record>,
}

impl RecordStore for CsvRecordStore {
    fn get(&self, index: usize) -> Option<Record> {
        self.records.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Builder for CsvRecordStore. Loads the capture file eagerly on build.
#[derive(Debug, Default)]
pub struct CsvRecordStoreBuilder {
    path: Option<PathBuf>,
    info_column: Option<String>,
    message_column: Option<String>,
}

impl CsvRecordStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    pub fn info_column(mut self, name: String) -> Self {
        self.info_column = Some(name);
        self
    }

    pub fn message_column(mut self, name: String) -> Self {
        self.message_column = Some(name);
        self
    }

    pub fn build(self) -> Result<CsvRecordStore, Error> {
        let path = self
            .path
            .ok_or_else(|| Error::MissingRequiredAttribute("path".to_string()))?;
        let info_column = self
            .info_column
            .unwrap_or_else(|| DEFAULT_INFO_COLUMN.to_string());
        let message_column = self
            .message_column
            .unwrap_or_else(|| DEFAULT_MESSAGE_COLUMN.to_string());

        let mut file = File::open(&path).map_err(|e| Error::IO {
            path: path.clone(),
            source: e,
        })?;

        let (schema, _) = Format::default()
            .with_header(true)
            .infer_schema(&mut file, Some(SCHEMA_INFERENCE_ROWS))
            .map_err(|e| Error::Arrow { source: e })?;
        file.rewind().map_err(|e| Error::IO {
            path: path.clone(),
            source: e,
        })?;

        let reader = arrow::csv::ReaderBuilder::new(Arc::new(schema))
            .with_header(true)
            .build(file)
            .map_err(|e| Error::Arrow { source: e })?;

        let mut records = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| Error::Arrow { source: e })?;

            let info = string_column(&batch, &info_column)?;
            let message = string_column(&batch, &message_column)?;

            for row in 0..batch.num_rows() {
                records.push(Record {
                    info: if info.is_null(row) {
                        String::new()
                    } else {
                        info.value(row).to_string()
                    },
                    message: if message.is_null(row) {
                        None
                    } else {
                        Some(message.value(row).to_string())
                    },
                });
            }
        }

        info!("Loaded {} records from {:?}", records.len(), path);
        Ok(CsvRecordStore { records })
    }
}

/// Resolves a named column as a string array.
fn string_column<'a>(
    batch: &'a arrow::array::RecordBatch,
    name: &str,
) -> Result<&'a StringArray, Error> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::MissingColumn(name.to_string()))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::ColumnType(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn publish_record() -> Record {
        Record {
            info: "Publish Message, Publish Message".to_string(),
            message: Some(r#"{"a":1},{"b":2}"#.to_string()),
        }
    }

    #[test]
    fn test_memory_store_lookup() {
        let mut store = MemoryRecordStore::new();
        store.insert(2027, publish_record());

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(2027), Some(publish_record()));
        assert_eq!(store.get(0), None);
    }

    #[test]
    fn test_csv_store_builder_missing_path() {
        let result = CsvRecordStoreBuilder::new().build();
        assert!(matches!(
            result.unwrap_err(),
            Error::MissingRequiredAttribute(_)
        ));
    }

    #[test]
    fn test_csv_store_loads_rows_in_order() {
        let dir = std::env::temp_dir().join("replay-store-test-rows");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("capture.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Info,Message").unwrap();
        writeln!(file, "Subscribe Request,").unwrap();
        writeln!(file, "\"Publish Message, Publish Message\",\"{{\"\"a\"\":1}},{{\"\"b\"\":2}}\"")
            .unwrap();
        drop(file);

        let store = CsvRecordStoreBuilder::new().path(path).build().unwrap();

        assert_eq!(store.len(), 2);
        let first = store.get(0).unwrap();
        assert_eq!(first.info, "Subscribe Request");
        // Empty CSV fields may surface as null or as an empty string.
        assert!(first.message.as_deref().unwrap_or("").is_empty());
        let second = store.get(1).unwrap();
        assert_eq!(second.info, "Publish Message, Publish Message");
        assert_eq!(second.message, Some(r#"{"a":1},{"b":2}"#.to_string()));
        assert_eq!(store.get(2), None);
    }

    #[test]
    fn test_csv_store_missing_column() {
        let dir = std::env::temp_dir().join("replay-store-test-cols");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("capture.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "Info,Body").unwrap();
        writeln!(file, "Subscribe Request,x").unwrap();
        drop(file);

        let result = CsvRecordStoreBuilder::new().path(path).build();
        assert!(matches!(result.unwrap_err(), Error::MissingColumn(name) if name == "Message"));
    }
}
