// ABOUTME: Tabular file I/O for CSV, JSON lines and Parquet
// ABOUTME: Row chunking for uploads and merging a Parquet directory into one CSV

use anyhow::{Context, Result};
use polars::functions::concat_df_diagonal;
use polars::prelude::{
    CsvReadOptions, CsvWriter, DataFrame, JsonFormat, JsonReader, JsonWriter, ParquetReader,
    ParquetWriter, SerReader, SerWriter,
};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::config::ConversionConfig;
use crate::error::ToolkitError;

/// Formats a dataset file can be uploaded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FileFormat {
    /// Comma-separated rows with a header line
    Csv,
    /// One JSON object per line
    Json,
    Parquet,
}

pub fn read_frame(path: &Path, format: FileFormat) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(ToolkitError::InvalidInput(format!("{} is not a file", path.display())).into());
    }

    let df = match format {
        // Every column is read as text so chunks carry the values unchanged.
        FileFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()
            .with_context(|| format!("Failed to read CSV {}", path.display()))?,
        FileFormat::Json => JsonReader::new(File::open(path)?)
            .with_json_format(JsonFormat::JsonLines)
            .finish()
            .with_context(|| format!("Failed to read JSON lines {}", path.display()))?,
        FileFormat::Parquet => ParquetReader::new(File::open(path)?)
            .finish()
            .with_context(|| format!("Failed to read Parquet {}", path.display()))?,
    };

    Ok(df)
}

/// Serializes a frame into a standalone buffer of the given format.
pub fn write_frame(df: &mut DataFrame, format: FileFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    match format {
        FileFormat::Csv => CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(df)
            .context("Failed to write CSV chunk")?,
        FileFormat::Json => JsonWriter::new(&mut buffer)
            .with_json_format(JsonFormat::JsonLines)
            .finish(df)
            .context("Failed to write JSON lines chunk")?,
        FileFormat::Parquet => {
            ParquetWriter::new(&mut buffer)
                .finish(df)
                .context("Failed to write Parquet chunk")?;
        }
    }
    Ok(buffer)
}

/// Streams a CSV file in batches of at most `rows` records.
///
/// Only one batch is held in memory. Each batch is written back as a
/// standalone CSV buffer starting with the header line, field bytes unchanged.
pub struct CsvChunks {
    reader: csv::Reader<File>,
    headers: csv::ByteRecord,
    rows: usize,
}

impl CsvChunks {
    pub fn open(path: &Path, rows: usize) -> Result<Self> {
        if !path.is_file() {
            return Err(ToolkitError::InvalidInput(format!("{} is not a file", path.display())).into());
        }
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open CSV {}", path.display()))?;
        let headers = reader
            .byte_headers()
            .with_context(|| format!("Failed to read CSV header of {}", path.display()))?
            .clone();

        Ok(Self {
            reader,
            headers,
            rows: rows.max(1),
        })
    }

    /// The next batch as CSV bytes, or `None` once every record was returned.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        let mut record = csv::ByteRecord::new();
        let mut count = 0;

        while count < self.rows && self.reader.read_byte_record(&mut record)? {
            if count == 0 {
                writer.write_byte_record(&self.headers)?;
            }
            writer.write_byte_record(&record)?;
            count += 1;
        }

        if count == 0 {
            return Ok(None);
        }
        let buffer = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .context("Failed to write CSV chunk")?;
        Ok(Some(buffer))
    }
}

/// Sequential row slices of at most `rows` rows.
pub struct RowChunks {
    frame: DataFrame,
    rows: usize,
    offset: usize,
}

impl RowChunks {
    pub fn new(frame: DataFrame, rows: usize) -> Self {
        Self {
            frame,
            rows: rows.max(1),
            offset: 0,
        }
    }
}

impl Iterator for RowChunks {
    type Item = DataFrame;

    fn next(&mut self) -> Option<DataFrame> {
        if self.offset >= self.frame.height() {
            return None;
        }
        let chunk = self.frame.slice(self.offset as i64, self.rows);
        self.offset += self.rows;
        Some(chunk)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSummary {
    pub files: usize,
    pub rows: usize,
    pub output: PathBuf,
}

/// Parquet files directly inside `directory`, in directory listing order.
pub fn list_parquet_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(directory)
        .with_context(|| format!("Failed to list {}", directory.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_parquet = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "parquet");
        if is_parquet && path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

/// Concatenates every Parquet file of the directory into a single CSV.
///
/// The output columns are the union of the files' columns, in first-seen order.
///
/// Returns `None` when the directory holds no Parquet file.
pub fn merge_parquet_to_csv(config: &ConversionConfig) -> Result<Option<ConversionSummary>> {
    let files = list_parquet_files(&config.directory)?;
    if files.is_empty() {
        tracing::info!(directory = %config.directory.display(), "No parquet files found");
        return Ok(None);
    }

    let mut frames = Vec::with_capacity(files.len());
    for (index, path) in files.iter().enumerate() {
        tracing::info!(
            "Processing file {}/{}: {}",
            index + 1,
            files.len(),
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        frames.push(read_frame(path, FileFormat::Parquet)?);
    }

    // Columns are matched by name; a column missing from a file is null for its rows.
    let mut merged = concat_df_diagonal(&frames).context("Failed to merge parquet files")?;
    tracing::info!(output = %config.output.display(), "Writing merged CSV");
    let mut file = File::create(&config.output)
        .with_context(|| format!("Failed to create {}", config.output.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut merged)
        .context("Failed to write merged CSV")?;

    Ok(Some(ConversionSummary {
        files: files.len(),
        rows: merged.height(),
        output: config.output.clone(),
    }))
}
