use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{info, warn};
use thiserror::Error;

use crate::models::ImageRecord;

#[derive(Error, Debug)]
pub enum RecordsError {
    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot read CSV header: {0}")]
    Header(#[source] csv::Error),

    #[error("Required column '{0}' not found in header")]
    MissingColumn(String),
}

/// Header names for the four columns a record is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub id: String,
    pub url: String,
    pub latitude: String,
    pub longitude: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id: "image_name".to_string(),
            url: "word_presslink".to_string(),
            latitude: "lat".to_string(),
            longitude: "lomg".to_string(),
        }
    }
}

struct ColumnIndexes {
    id: usize,
    url: usize,
    latitude: usize,
    longitude: usize,
}

impl ColumnIndexes {
    fn resolve(headers: &StringRecord, columns: &ColumnMapping) -> Result<Self, RecordsError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| RecordsError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            id: find(&columns.id)?,
            url: find(&columns.url)?,
            latitude: find(&columns.latitude)?,
            longitude: find(&columns.longitude)?,
        })
    }
}

pub fn load_records(path: &Path, columns: &ColumnMapping) -> Result<Vec<ImageRecord>, RecordsError> {
    let file = File::open(path).map_err(|source| RecordsError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let records = read_records(file, columns)?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Reads records from CSV with a header row. Only a missing header column is
/// fatal: unreadable rows are skipped and bad values become `None`.
pub fn read_records<R: io::Read>(reader: R, columns: &ColumnMapping) -> Result<Vec<ImageRecord>, RecordsError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers().map_err(RecordsError::Header)?.clone();
    let indexes = ColumnIndexes::resolve(&headers, columns)?;

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping unreadable row {}: {}", line + 2, e);
                continue;
            }
        };

        let id = match field(&row, indexes.id) {
            Some(id) => id.to_string(),
            None => {
                warn!("Skipping row {} without an identifier", line + 2);
                continue;
            }
        };

        records.push(ImageRecord::new(
            id,
            field(&row, indexes.url).map(str::to_string),
            field(&row, indexes.latitude).and_then(parse_coordinate),
            field(&row, indexes.longitude).and_then(parse_coordinate),
        ));
    }

    Ok(records)
}

fn field(row: &StringRecord, index: usize) -> Option<&str> {
    row.get(index).filter(|value| !value.is_empty())
}

fn parse_coordinate(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}
