// ABOUTME: Merges field descriptions from a CSV file into a dataset schema
// ABOUTME: Refuses to update anything when a described field is missing from the schema

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::config::DescriptionConfig;
use crate::error::ToolkitError;
use crate::remote::models::Dataset;
use crate::remote::DatasetApi;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldDescription {
    pub field_name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptionOutcome {
    /// The dataset was written back; field names in CSV order.
    Updated(Vec<String>),
    /// Nothing was written; these CSV fields are not in the schema.
    MissingFields(Vec<String>),
}

pub fn read_descriptions(csv_path: &Path) -> Result<Vec<FieldDescription>> {
    let mut reader = csv::Reader::from_path(csv_path).map_err(|e| {
        ToolkitError::InvalidInput(format!("cannot open {}: {}", csv_path.display(), e))
    })?;

    let mut rows = Vec::new();
    for (index, row) in reader.deserialize::<FieldDescription>().enumerate() {
        let row = row.map_err(|e| {
            ToolkitError::InvalidInput(format!(
                "{} row {}: {}",
                csv_path.display(),
                index + 2,
                e
            ))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// CSV field names absent from the schema, in CSV order without repeats.
pub fn missing_fields(dataset: &Dataset, descriptions: &[FieldDescription]) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for row in descriptions {
        if !dataset.has_field(&row.field_name) && !missing.contains(&row.field_name) {
            missing.push(row.field_name.clone());
        }
    }
    missing
}

/// Overwrites the description of every described field present in the schema.
pub fn apply_descriptions(dataset: &mut Dataset, descriptions: &[FieldDescription]) -> Vec<String> {
    let Some(properties) = dataset.schema_properties_mut() else {
        return Vec::new();
    };

    let mut updated = Vec::new();
    for row in descriptions {
        let Some(field) = properties.get_mut(&row.field_name) else {
            continue;
        };
        match field {
            Value::Object(metadata) => {
                metadata.insert(
                    "description".to_string(),
                    Value::String(row.description.clone()),
                );
            }
            other => {
                let mut metadata = serde_json::Map::new();
                metadata.insert(
                    "description".to_string(),
                    Value::String(row.description.clone()),
                );
                *other = Value::Object(metadata);
            }
        }
        updated.push(row.field_name.clone());
    }
    updated
}

/// Fetches the dataset, checks every described field exists and writes the
/// merged schema back in a single update.
pub async fn update_descriptions<A: DatasetApi + ?Sized>(
    api: &A,
    config: &DescriptionConfig,
) -> Result<DescriptionOutcome> {
    let descriptions = read_descriptions(&config.csv_path)?;
    let mut dataset = api.get_dataset(&config.dataset_id).await?;

    let missing = missing_fields(&dataset, &descriptions);
    if !missing.is_empty() {
        tracing::warn!(?missing, "Fields missing from the dataset schema, nothing updated");
        return Ok(DescriptionOutcome::MissingFields(missing));
    }

    let updated = apply_descriptions(&mut dataset, &descriptions);
    api.update_dataset(&config.dataset_id, &dataset).await?;
    tracing::info!(dataset_id = %config.dataset_id, "Dataset successfully updated");

    Ok(DescriptionOutcome::Updated(updated))
}
