// ABOUTME: Remote dataset API module
// ABOUTME: Defines the DatasetApi seam that every workflow is written against

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod models;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

pub use client::{DatasetClient, DEFAULT_API_BASE_URL};
pub use models::{
    Dataset, FindFilesPage, Mapping, MappingBody, MappingRequest, RemoteId, UploadSlot,
};

/// Where mapping posts go. Chosen once per copy run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingEndpoint {
    /// Global endpoint, usable with an admin token.
    Admin,
    /// Endpoint scoped to the company owning the target dataset.
    CompanyScoped(RemoteId),
}

impl MappingEndpoint {
    pub fn path(&self) -> String {
        match self {
            MappingEndpoint::Admin => "mappings/".to_string(),
            MappingEndpoint::CompanyScoped(company_id) => {
                format!("mappings/companies/{}", company_id)
            }
        }
    }
}

/// Operations the workflows need from the dataset API.
///
/// Every call surfaces a non-2xx response as `ToolkitError::Remote` without
/// retrying.
#[async_trait]
pub trait DatasetApi: Send + Sync {
    async fn get_dataset(&self, dataset_id: &str) -> Result<Dataset>;

    async fn update_dataset(&self, dataset_id: &str, dataset: &Dataset) -> Result<()>;

    async fn post_mapping(
        &self,
        endpoint: &MappingEndpoint,
        request: &MappingRequest<'_>,
    ) -> Result<()>;

    async fn find_files(
        &self,
        dataset_id: &str,
        per_page: u32,
        cursor: Option<&RemoteId>,
    ) -> Result<FindFilesPage>;

    /// Resolves the signed download URL of one file in a snapshot.
    async fn download_url(
        &self,
        dataset_id: &str,
        snapshot_id: &RemoteId,
        file_path: &str,
    ) -> Result<String>;

    /// Streams the body behind a signed URL into `destination`, returning the
    /// number of bytes written.
    async fn download_to(&self, url: &str, destination: &Path) -> Result<u64>;

    async fn request_upload_slot(&self, chunk_name: &str) -> Result<UploadSlot>;

    /// Sends the staged chunk file to the slot's signed URL.
    async fn upload_chunk(&self, slot: &UploadSlot, chunk_file: &Path) -> Result<()>;

    async fn notify_upload(&self, dataset_id: &str, remote_path: &str) -> Result<()>;
}
