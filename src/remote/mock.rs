// ABOUTME: In-memory DatasetApi used by the workflow tests
// ABOUTME: Records every call and fails on demand so tests can assert the request sequence

use super::models::{Dataset, FindFilesPage, MappingBody, MappingRequest, RemoteId, UploadSlot};
use super::{DatasetApi, MappingEndpoint};
use crate::error::ToolkitError;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct PostedMapping {
    pub endpoint: MappingEndpoint,
    pub dataset_id: RemoteId,
    pub attribute_id: i64,
    pub mapping: MappingBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpload {
    pub slot_url: String,
    pub chunk_file: PathBuf,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct MockDatasetApi {
    datasets: Mutex<HashMap<String, Dataset>>,
    pages: Mutex<Vec<FindFilesPage>>,
    file_bodies: Mutex<HashMap<String, Vec<u8>>>,
    failing_attributes: Mutex<HashSet<i64>>,
    failing_download_urls: Mutex<HashSet<String>>,
    fail_notify: AtomicBool,

    pub dataset_fetches: Mutex<Vec<String>>,
    pub updates: Mutex<Vec<(String, Dataset)>>,
    pub posted: Mutex<Vec<PostedMapping>>,
    pub listing_cursors: Mutex<Vec<Option<RemoteId>>>,
    pub slot_requests: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<StagedUpload>>,
    pub notifications: Mutex<Vec<(String, String)>>,
}

impl MockDatasetApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(self, dataset_id: &str, dataset: Dataset) -> Self {
        self.datasets
            .lock()
            .unwrap()
            .insert(dataset_id.to_string(), dataset);
        self
    }

    /// Pages are served in order, one per `find_files` call.
    pub fn with_pages(self, pages: Vec<FindFilesPage>) -> Self {
        *self.pages.lock().unwrap() = pages;
        self
    }

    pub fn with_file(self, file_path: &str, body: &[u8]) -> Self {
        self.file_bodies
            .lock()
            .unwrap()
            .insert(file_path.to_string(), body.to_vec());
        self
    }

    pub fn fail_attribute(self, attribute_id: i64) -> Self {
        self.failing_attributes.lock().unwrap().insert(attribute_id);
        self
    }

    pub fn fail_download_url(self, file_path: &str) -> Self {
        self.failing_download_urls
            .lock()
            .unwrap()
            .insert(file_path.to_string());
        self
    }

    pub fn set_fail_notify(&self, fail: bool) {
        self.fail_notify.store(fail, Ordering::SeqCst);
    }
}

fn remote_error(status: u16, body: &str) -> anyhow::Error {
    ToolkitError::Remote {
        status,
        body: body.to_string(),
    }
    .into()
}

#[async_trait]
impl DatasetApi for MockDatasetApi {
    async fn get_dataset(&self, dataset_id: &str) -> Result<Dataset> {
        self.dataset_fetches
            .lock()
            .unwrap()
            .push(dataset_id.to_string());
        self.datasets
            .lock()
            .unwrap()
            .get(dataset_id)
            .cloned()
            .ok_or_else(|| remote_error(404, "dataset not found"))
    }

    async fn update_dataset(&self, dataset_id: &str, dataset: &Dataset) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((dataset_id.to_string(), dataset.clone()));
        Ok(())
    }

    async fn post_mapping(
        &self,
        endpoint: &MappingEndpoint,
        request: &MappingRequest<'_>,
    ) -> Result<()> {
        self.posted.lock().unwrap().push(PostedMapping {
            endpoint: endpoint.clone(),
            dataset_id: request.dataset_id.clone(),
            attribute_id: request.attribute_id,
            mapping: request.mapping.clone(),
        });
        if self
            .failing_attributes
            .lock()
            .unwrap()
            .contains(&request.attribute_id)
        {
            return Err(remote_error(
                400,
                &format!("attribute {} rejected", request.attribute_id),
            ));
        }
        Ok(())
    }

    async fn find_files(
        &self,
        _dataset_id: &str,
        _per_page: u32,
        cursor: Option<&RemoteId>,
    ) -> Result<FindFilesPage> {
        let mut cursors = self.listing_cursors.lock().unwrap();
        let index = cursors.len();
        cursors.push(cursor.cloned());
        self.pages
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .ok_or_else(|| remote_error(500, "no more pages configured"))
    }

    async fn download_url(
        &self,
        _dataset_id: &str,
        snapshot_id: &RemoteId,
        file_path: &str,
    ) -> Result<String> {
        if self.failing_download_urls.lock().unwrap().contains(file_path) {
            return Err(remote_error(403, "forbidden"));
        }
        Ok(format!("mock://{}/{}", snapshot_id, file_path))
    }

    async fn download_to(&self, url: &str, destination: &Path) -> Result<u64> {
        let file_path = url
            .strip_prefix("mock://")
            .and_then(|rest| rest.split_once('/'))
            .map(|(_, path)| path.to_string())
            .unwrap_or_default();
        let body = self
            .file_bodies
            .lock()
            .unwrap()
            .get(&file_path)
            .cloned()
            .ok_or_else(|| remote_error(404, "no such object"))?;
        std::fs::write(destination, &body)?;
        Ok(body.len() as u64)
    }

    async fn request_upload_slot(&self, chunk_name: &str) -> Result<UploadSlot> {
        self.slot_requests
            .lock()
            .unwrap()
            .push(chunk_name.to_string());
        Ok(UploadSlot {
            url: format!("https://storage.example.com/{}?signature=abc", chunk_name),
            path: format!("uploads/{}", chunk_name),
        })
    }

    async fn upload_chunk(&self, slot: &UploadSlot, chunk_file: &Path) -> Result<()> {
        let bytes = std::fs::read(chunk_file)?;
        self.uploads.lock().unwrap().push(StagedUpload {
            slot_url: slot.url.clone(),
            chunk_file: chunk_file.to_path_buf(),
            bytes,
        });
        Ok(())
    }

    async fn notify_upload(&self, dataset_id: &str, remote_path: &str) -> Result<()> {
        self.notifications
            .lock()
            .unwrap()
            .push((dataset_id.to_string(), remote_path.to_string()));
        if self.fail_notify.load(Ordering::SeqCst) {
            return Err(remote_error(502, "notify failed"));
        }
        Ok(())
    }
}
