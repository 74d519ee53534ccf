// ABOUTME: HTTP client for the remote dataset-management API
// ABOUTME: Handles bearer auth, signed-URL transfers and non-2xx error surfacing

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::models::{
    Dataset, DownloadLink, FindFilesPage, MappingRequest, RemoteId, UploadNotification,
    UploadSlot,
};
use super::{DatasetApi, MappingEndpoint};
use crate::error::ToolkitError;

pub const DEFAULT_API_BASE_URL: &str = "https://app.narrative.io/openapi";

pub struct DatasetClient {
    client: Client,
    api_base_url: String,
    token: String,
}

impl DatasetClient {
    pub fn new(api_base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        // Only the connect phase is bounded; file transfers may run for a long time.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path.trim_start_matches('/'))
    }
}

/// Turns a non-2xx response into `ToolkitError::Remote`, keeping the body verbatim.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ToolkitError::Remote {
        status: status.as_u16(),
        body,
    }
    .into())
}

#[async_trait]
impl DatasetApi for DatasetClient {
    async fn get_dataset(&self, dataset_id: &str) -> Result<Dataset> {
        let url = self.endpoint(&format!("datasets/{}", dataset_id));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch dataset {}", dataset_id))?;
        let response = ensure_success(response).await?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse dataset {}", dataset_id))
    }

    async fn update_dataset(&self, dataset_id: &str, dataset: &Dataset) -> Result<()> {
        let url = self.endpoint(&format!("datasets/{}", dataset_id));

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(dataset)
            .send()
            .await
            .with_context(|| format!("Failed to update dataset {}", dataset_id))?;
        ensure_success(response).await?;

        Ok(())
    }

    async fn post_mapping(
        &self,
        endpoint: &MappingEndpoint,
        request: &MappingRequest<'_>,
    ) -> Result<()> {
        let url = self.endpoint(&endpoint.path());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to post mapping for attribute {}", request.attribute_id))?;
        ensure_success(response).await?;

        Ok(())
    }

    async fn find_files(
        &self,
        dataset_id: &str,
        per_page: u32,
        cursor: Option<&RemoteId>,
    ) -> Result<FindFilesPage> {
        let url = self.endpoint(&format!("datasets/{}/find-files", dataset_id));

        let mut query = vec![("per_page", per_page.to_string())];
        if let Some(cursor) = cursor {
            query.push(("snapshot", cursor.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await
            .with_context(|| format!("Failed to list files of dataset {}", dataset_id))?;
        let response = ensure_success(response).await?;

        response
            .json()
            .await
            .context("Failed to parse file listing")
    }

    async fn download_url(
        &self,
        dataset_id: &str,
        snapshot_id: &RemoteId,
        file_path: &str,
    ) -> Result<String> {
        let url = self.endpoint(&format!(
            "datasets/{}/snapshots/{}/files-added/{}/download",
            dataset_id,
            snapshot_id,
            urlencoding::encode(file_path)
        ));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("Failed to request download URL for {}", file_path))?;
        let response = ensure_success(response).await?;

        let link: DownloadLink = response
            .json()
            .await
            .context("Failed to parse download link")?;
        link.download_url
            .with_context(|| format!("No download URL returned for {}", file_path))
    }

    async fn download_to(&self, url: &str, destination: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to start file download")?;
        let mut response = ensure_success(response).await?;

        let written = async {
            let mut file = tokio::fs::File::create(destination)
                .await
                .with_context(|| format!("Failed to create {}", destination.display()))?;

            let mut written = 0u64;
            while let Some(chunk) = response
                .chunk()
                .await
                .context("Failed to read download stream")?
            {
                file.write_all(&chunk)
                    .await
                    .with_context(|| format!("Failed to write {}", destination.display()))?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, anyhow::Error>(written)
        }
        .await;

        // A partial file must not look like a finished download.
        if written.is_err() {
            let _ = tokio::fs::remove_file(destination).await;
        }
        written
    }

    async fn request_upload_slot(&self, chunk_name: &str) -> Result<UploadSlot> {
        let url = self.endpoint(&format!("uploads/{}", urlencoding::encode(chunk_name)));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to request upload slot for {}", chunk_name))?;
        let response = ensure_success(response).await?;

        response
            .json()
            .await
            .context("Failed to parse upload slot")
    }

    async fn upload_chunk(&self, slot: &UploadSlot, chunk_file: &Path) -> Result<()> {
        let body = tokio::fs::read(chunk_file)
            .await
            .with_context(|| format!("Failed to read staged chunk {}", chunk_file.display()))?;

        let response = self
            .client
            .put(&slot.url)
            .body(body)
            .send()
            .await
            .with_context(|| format!("Failed to upload chunk to {}", slot.path))?;
        ensure_success(response).await?;

        Ok(())
    }

    async fn notify_upload(&self, dataset_id: &str, remote_path: &str) -> Result<()> {
        let url = self.endpoint(&format!("datasets/{}/upload", dataset_id));
        let payload = UploadNotification {
            source_file: remote_path,
        };
        tracing::debug!(url = %url, source_file = remote_path, "Notifying upload");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to notify upload of {}", remote_path))?;
        let status = response.status();
        ensure_success(response).await?;
        tracing::debug!(status = %status, "Upload notification accepted");

        Ok(())
    }
}
