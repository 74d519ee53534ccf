// ABOUTME: Chunked upload of a local tabular file into a dataset
// ABOUTME: Stages each row chunk in a temp file, uploads it to a signed slot and notifies the API

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

use crate::config::UploadConfig;
use crate::remote::DatasetApi;
use crate::tabular::{read_frame, write_frame, CsvChunks, FileFormat, RowChunks};

pub const DEFAULT_CHUNK_ROWS: usize = 50_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedChunk {
    pub name: String,
    pub remote_path: String,
    pub bytes: usize,
}

pub fn chunk_name(file_name: &str, index: usize) -> String {
    format!("{}_part_{}", file_name, index)
}

/// Yields serialized chunks of the file being uploaded.
enum ChunkSource {
    /// CSV is streamed, never loaded whole.
    Csv(CsvChunks),
    Frame { chunks: RowChunks, format: FileFormat },
}

impl ChunkSource {
    fn open(path: &Path, format: FileFormat, rows: usize) -> Result<Self> {
        match format {
            FileFormat::Csv => Ok(ChunkSource::Csv(CsvChunks::open(path, rows)?)),
            FileFormat::Json | FileFormat::Parquet => Ok(ChunkSource::Frame {
                chunks: RowChunks::new(read_frame(path, format)?, rows),
                format,
            }),
        }
    }

    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self {
            ChunkSource::Csv(chunks) => chunks.next_chunk(),
            ChunkSource::Frame { chunks, format } => match chunks.next() {
                Some(mut frame) => Ok(Some(write_frame(&mut frame, *format)?)),
                None => Ok(None),
            },
        }
    }
}

/// Splits the configured file into row chunks and uploads them in order.
///
/// The first failing step of any chunk aborts the run. Each chunk's staging
/// file is removed whether or not its upload succeeded.
pub async fn upload_file<A: DatasetApi + ?Sized>(
    api: &A,
    config: &UploadConfig,
) -> Result<Vec<UploadedChunk>> {
    let file_name = config
        .file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", config.file_path.display()))?;

    let mut source = ChunkSource::open(&config.file_path, config.format, config.chunk_rows)?;
    let mut uploaded = Vec::new();
    let mut index = 0;
    while let Some(bytes) = source.next_chunk()? {
        if index == 0 {
            tracing::info!(file = %file_name, "Uploading file");
        }
        let name = chunk_name(&file_name, index);
        let remote_path = upload_chunk(api, config, &name, &bytes)
            .await
            .with_context(|| format!("Chunk {} of {} failed", index, file_name))?;

        tracing::info!(
            "Chunk {} of {} successfully uploaded to dataset {}",
            index,
            file_name,
            config.dataset_id
        );
        uploaded.push(UploadedChunk {
            name,
            remote_path,
            bytes: bytes.len(),
        });
        index += 1;
    }

    if uploaded.is_empty() {
        tracing::warn!(file = %file_name, "File has no rows, nothing to upload");
    }
    Ok(uploaded)
}

async fn upload_chunk<A: DatasetApi + ?Sized>(
    api: &A,
    config: &UploadConfig,
    name: &str,
    bytes: &[u8],
) -> Result<String> {
    // Dropping the NamedTempFile deletes it, on success and on every early return.
    let mut staged = stage_chunk(config.staging_dir.as_deref(), name)?;
    staged.write_all(bytes).context("Failed to stage chunk")?;
    staged.flush().context("Failed to stage chunk")?;

    let slot = api.request_upload_slot(name).await?;
    api.upload_chunk(&slot, staged.path()).await?;
    api.notify_upload(&config.dataset_id, &slot.path).await?;

    Ok(slot.path)
}

fn stage_chunk(staging_dir: Option<&Path>, name: &str) -> Result<tempfile::NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.suffix(name);
    let staged = match staging_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    };
    staged.context("Failed to create staging file")
}
