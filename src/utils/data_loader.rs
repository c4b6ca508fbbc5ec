//! Data loading utilities

use crate::error::{RampError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File formats understood by [`DataLoader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Tsv,
    Json,
    Parquet,
}

impl FileFormat {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(FileFormat::Csv),
            "tsv" => Ok(FileFormat::Tsv),
            "json" | "jsonl" => Ok(FileFormat::Json),
            "parquet" | "pq" => Ok(FileFormat::Parquet),
            _ => Err(RampError::InvalidInput(format!(
                "Unsupported file format: '{}'",
                path.display()
            ))),
        }
    }
}

/// Data loader for various file formats
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Rows scanned to infer CSV column types
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: 1000,
        }
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a delimited text file with a header row
    pub fn load_csv(&self, path: &Path, separator: u8) -> Result<DataFrame> {
        let parse_opts = CsvParseOptions::default().with_separator(separator);
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
            .finish()?;
        Ok(df)
    }

    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        Ok(ParquetReader::new(file).finish()?)
    }

    pub fn load_json(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path)?;
        Ok(JsonReader::new(file).finish()?)
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        let df = match format {
            FileFormat::Csv => self.load_csv(path, b',')?,
            FileFormat::Tsv => self.load_csv(path, b'\t')?,
            FileFormat::Json => self.load_json(path)?,
            FileFormat::Parquet => self.load_parquet(path)?,
        };
        debug!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            "Loaded data"
        );
        Ok(df)
    }
}

/// Save DataFrame to various formats
pub struct DataSaver;

impl DataSaver {
    /// Save using the format implied by the extension
    pub fn save_auto(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        match FileFormat::from_path(path)? {
            FileFormat::Csv => CsvWriter::new(&mut file).finish(df)?,
            FileFormat::Tsv => CsvWriter::new(&mut file).with_separator(b'\t').finish(df)?,
            FileFormat::Json => JsonWriter::new(&mut file).finish(df)?,
            FileFormat::Parquet => {
                ParquetWriter::new(file).finish(df)?;
            }
        }
        Ok(())
    }
}
