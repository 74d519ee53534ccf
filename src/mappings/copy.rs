// ABOUTME: Copies attribute mappings onto a target dataset
// ABOUTME: Posts each mapping and keeps going past per-item failures

use anyhow::Result;
use std::path::{Path, PathBuf};

use super::export_mappings;
use crate::config::CopyTarget;
use crate::error::{raw_error_text, ToolkitError};
use crate::remote::models::{Mapping, MappingRequest, RemoteId};
use crate::remote::{DatasetApi, MappingEndpoint};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingFailure {
    pub attribute_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopySummary {
    pub succeeded: usize,
    pub failures: Vec<MappingFailure>,
}

impl CopySummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Fetches a dataset and writes its mappings to `{dataset_id}_mappings.json`
/// under `output_dir`.
pub async fn export_dataset_mappings<A: DatasetApi + ?Sized>(
    api: &A,
    dataset_id: &str,
    output_dir: &Path,
) -> Result<(Vec<Mapping>, PathBuf)> {
    let dataset = api.get_dataset(dataset_id).await?;
    let mappings = dataset.typed_mappings().map_err(|e| {
        ToolkitError::InvalidInput(format!(
            "dataset {} returned mappings that cannot be read: {}",
            dataset_id, e
        ))
    })?;

    let path = export_mappings(output_dir, dataset_id, &mappings)?;
    tracing::info!(
        dataset_id,
        count = mappings.len(),
        path = %path.display(),
        "Saved source mappings"
    );
    Ok((mappings, path))
}

/// Picks the endpoint mapping posts go to. Non-admin runs need the target's company.
pub async fn resolve_endpoint<A: DatasetApi + ?Sized>(
    api: &A,
    target: &CopyTarget,
) -> Result<MappingEndpoint> {
    if target.admin {
        return Ok(MappingEndpoint::Admin);
    }

    let dataset = api.get_dataset(&target.dataset_id).await?;
    match dataset.company_id() {
        Some(company_id) => Ok(MappingEndpoint::CompanyScoped(company_id)),
        None => Err(ToolkitError::Configuration(format!(
            "target dataset {} has no company_id",
            target.dataset_id
        ))
        .into()),
    }
}

/// Posts every mapping to the target dataset.
///
/// Only endpoint resolution can abort the run; a rejected mapping is recorded
/// in the summary and the loop moves on.
pub async fn copy_mappings<A: DatasetApi + ?Sized>(
    api: &A,
    target: &CopyTarget,
    mappings: &[Mapping],
) -> Result<CopySummary> {
    let endpoint = resolve_endpoint(api, target).await?;
    let dataset_id = RemoteId::parse(&target.dataset_id);
    let mut summary = CopySummary::default();

    for mapping in mappings {
        let request = MappingRequest {
            dataset_id: &dataset_id,
            attribute_id: mapping.attribute_id,
            mapping: &mapping.mapping,
        };

        match api.post_mapping(&endpoint, &request).await {
            Ok(()) => {
                tracing::info!(attribute_id = mapping.attribute_id, "Mapping posted");
                summary.succeeded += 1;
            }
            Err(err) => {
                let error = raw_error_text(&err);
                tracing::warn!(
                    attribute_id = mapping.attribute_id,
                    error = %error,
                    "Failed to post mapping"
                );
                summary.failures.push(MappingFailure {
                    attribute_id: mapping.attribute_id,
                    error,
                });
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::MockDatasetApi;
    use crate::remote::models::Dataset;
    use serde_json::json;

    fn sample_mappings(ids: &[i64]) -> Vec<Mapping> {
        ids.iter()
            .map(|id| {
                serde_json::from_value(json!({
                    "attribute_id": id,
                    "mapping": {"type": "value_mapping", "expression": format!("col_{}", id)}
                }))
                .unwrap()
            })
            .collect()
    }

    fn target(admin: bool) -> CopyTarget {
        CopyTarget {
            dataset_id: "200".to_string(),
            token: "target-token".to_string(),
            admin,
        }
    }

    fn company_dataset() -> Dataset {
        serde_json::from_value(json!({"id": 200, "company_id": 77})).unwrap()
    }

    #[tokio::test]
    async fn test_partial_failures_are_counted_and_listed() {
        let api = MockDatasetApi::new()
            .with_dataset("200", company_dataset())
            .fail_attribute(2)
            .fail_attribute(4);
        let mappings = sample_mappings(&[1, 2, 3, 4, 5]);

        let summary = copy_mappings(&api, &target(false), &mappings).await.unwrap();

        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed(), 2);
        let failed_ids: Vec<i64> = summary.failures.iter().map(|f| f.attribute_id).collect();
        assert_eq!(failed_ids, vec![2, 4]);
        assert_eq!(summary.failures[0].error, "attribute 2 rejected");
        assert_eq!(api.posted.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_non_admin_posts_to_company_endpoint() {
        let api = MockDatasetApi::new().with_dataset("200", company_dataset());

        copy_mappings(&api, &target(false), &sample_mappings(&[9]))
            .await
            .unwrap();

        let posted = api.posted.lock().unwrap();
        assert_eq!(
            posted[0].endpoint,
            MappingEndpoint::CompanyScoped(RemoteId::Number(77))
        );
        assert_eq!(posted[0].dataset_id, RemoteId::Number(200));
        assert_eq!(posted[0].attribute_id, 9);
    }

    #[tokio::test]
    async fn test_admin_skips_company_lookup() {
        let api = MockDatasetApi::new();

        let summary = copy_mappings(&api, &target(true), &sample_mappings(&[1, 2]))
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert!(api.dataset_fetches.lock().unwrap().is_empty());
        assert!(api
            .posted
            .lock()
            .unwrap()
            .iter()
            .all(|p| p.endpoint == MappingEndpoint::Admin));
    }

    #[tokio::test]
    async fn test_missing_company_id_is_configuration_error() {
        let api = MockDatasetApi::new()
            .with_dataset("200", serde_json::from_value(json!({"id": 200})).unwrap());

        let err = copy_mappings(&api, &target(false), &sample_mappings(&[1]))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ToolkitError>(),
            Some(ToolkitError::Configuration(_))
        ));
        assert!(api.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_writes_mapping_file_named_after_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let source: Dataset = serde_json::from_value(json!({
            "id": 100,
            "mappings": [
                {"id": 1, "dataset_id": 100, "attribute_id": 3,
                 "mapping": {"type": "value_mapping", "expression": {"value": "a", "dialect": "spark"}}}
            ]
        }))
        .unwrap();
        let api = MockDatasetApi::new().with_dataset("100", source);

        let (mappings, path) = export_dataset_mappings(&api, "100", dir.path())
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("100_mappings.json"));
        assert_eq!(mappings.len(), 1);
        // Copy reuses mappings verbatim; the dialect wrapper is kept.
        assert_eq!(super::super::load_mappings(&path).unwrap(), mappings);
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            written,
            json!([{"attribute_id": 3, "mapping": {"type": "value_mapping",
                    "expression": {"value": "a", "dialect": "spark"}}}])
        );
    }

    #[tokio::test]
    async fn test_failed_source_fetch_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let api = MockDatasetApi::new();

        let err = export_dataset_mappings(&api, "missing", dir.path())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ToolkitError>(),
            Some(ToolkitError::Remote { status: 404, .. })
        ));
        assert!(!dir.path().join("missing_mappings.json").exists());
    }
}
