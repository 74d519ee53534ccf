// ABOUTME: Downloads every file of a dataset's downloadable snapshots
// ABOUTME: Pages through the file listing and streams each file to local storage

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

use crate::config::DownloadConfig;
use crate::error::{raw_error_text, ToolkitError};
use crate::remote::models::{RemoteFile, RemoteId};
use crate::remote::DatasetApi;

pub const FILES_PER_PAGE: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub bytes: u64,
    pub skipped_snapshots: Vec<RemoteId>,
    pub failures: Vec<FileFailure>,
}

/// Maps a remote file path under `root`, refusing paths that would escape it.
pub fn local_path(root: &Path, remote_path: &str) -> Result<PathBuf, ToolkitError> {
    let relative = Path::new(remote_path.trim_start_matches('/'));
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || relative.as_os_str().is_empty() {
        return Err(ToolkitError::InvalidInput(format!(
            "refusing to write remote path {:?} outside the output directory",
            remote_path
        )));
    }
    Ok(root.join(relative))
}

/// Walks every listing page until the server reports no further page.
///
/// Listing failures abort the run. Non-downloadable snapshots and files whose
/// URL or body cannot be fetched are logged, recorded and skipped.
pub async fn download_dataset_files<A: DatasetApi + ?Sized>(
    api: &A,
    config: &DownloadConfig,
) -> Result<DownloadSummary> {
    let root = config.output_dir.join(&config.dataset_id);
    let mut summary = DownloadSummary::default();
    let mut cursor: Option<RemoteId> = None;

    loop {
        let page = api
            .find_files(&config.dataset_id, FILES_PER_PAGE, cursor.as_ref())
            .await?;

        for snapshot in page.files_per_snapshot {
            if !snapshot.is_downloadable {
                tracing::warn!(snapshot_id = %snapshot.snapshot_id, "Snapshot is not downloadable");
                summary.skipped_snapshots.push(snapshot.snapshot_id);
                continue;
            }

            for file in &snapshot.files {
                tracing::info!(path = %file.path, size = file.size, "Processing file");
                match download_one(api, config, &root, &snapshot.snapshot_id, file).await {
                    Ok(bytes) => {
                        summary.downloaded += 1;
                        summary.bytes += bytes;
                    }
                    Err(err) => {
                        let error = raw_error_text(&err);
                        tracing::warn!(path = %file.path, error = %error, "Skipping file");
                        summary.failures.push(FileFailure {
                            path: file.path.clone(),
                            error,
                        });
                    }
                }
            }
        }

        if !page.has_next {
            break;
        }
        cursor = page.next_snapshot;
    }

    Ok(summary)
}

async fn download_one<A: DatasetApi + ?Sized>(
    api: &A,
    config: &DownloadConfig,
    root: &Path,
    snapshot_id: &RemoteId,
    file: &RemoteFile,
) -> Result<u64> {
    let destination = local_path(root, &file.path)?;
    let url = api
        .download_url(&config.dataset_id, snapshot_id, &file.path)
        .await?;

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let bytes = api.download_to(&url, &destination).await?;
    tracing::info!(path = %file.path, to = %destination.display(), "Downloaded file");
    Ok(bytes)
}
