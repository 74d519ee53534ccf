// ABOUTME: Mapping export file handling and expression cleaning
// ABOUTME: Saves, loads and imports {attribute_id, mapping} records

pub mod copy;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ToolkitError;
use crate::remote::models::{Expression, Mapping, MappingBody};

pub use copy::{copy_mappings, CopySummary, MappingFailure};

/// File name the mappings of `dataset_id` are exported to.
pub fn export_file_name(dataset_id: &str) -> String {
    format!("{}_mappings.json", dataset_id)
}

/// Replaces a dialect-tagged expression by its bare `value`, unwrapping
/// nested wrappers until none is left.
pub fn strip_dialect(mut expression: Expression) -> Expression {
    while let Expression::Tagged(tagged) = expression {
        expression = match tagged.value {
            Value::String(text) => Expression::Plain(text),
            // Re-read so a nested `{value, ..}` object is seen as a wrapper again.
            other => serde_json::from_value(other.clone()).unwrap_or(Expression::Other(other)),
        };
    }
    expression
}

/// Strips dialect wrappers from every expression of a mapping.
pub fn clean_mapping(mut body: MappingBody) -> MappingBody {
    match &mut body {
        MappingBody::ValueMapping(value) => {
            value.expression = strip_dialect(value.expression.clone());
        }
        MappingBody::ObjectMapping(object) => {
            for property in &mut object.property_mappings {
                property.expression = strip_dialect(property.expression.clone());
            }
        }
    }
    body
}

pub fn save_mappings(path: &Path, mappings: &[Mapping]) -> Result<()> {
    let json = serde_json::to_string_pretty(mappings).context("Failed to serialize mappings")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_mappings(path: &Path) -> Result<Vec<Mapping>> {
    let raw = fs::read_to_string(path).map_err(|e| {
        ToolkitError::InvalidInput(format!("cannot read mapping file {}: {}", path.display(), e))
    })?;
    let mappings = serde_json::from_str(&raw).map_err(|e| {
        ToolkitError::InvalidInput(format!(
            "mapping file {} is not a valid mapping list: {}",
            path.display(),
            e
        ))
    })?;
    Ok(mappings)
}

/// Writes the mappings of a dataset next to `output_dir` and returns the path.
pub fn export_mappings(output_dir: &Path, dataset_id: &str, mappings: &[Mapping]) -> Result<PathBuf> {
    let path = output_dir.join(export_file_name(dataset_id));
    save_mappings(&path, mappings)?;
    Ok(path)
}

#[derive(Debug, Deserialize)]
struct MappingRow {
    attribute_id: String,
    mapping: String,
}

/// Reads a query export with `attribute_id` and `mapping` (JSON text) columns.
pub fn read_csv_mappings(csv_path: &Path) -> Result<Vec<Mapping>> {
    let mut reader = csv::Reader::from_path(csv_path).map_err(|e| {
        ToolkitError::InvalidInput(format!("cannot open {}: {}", csv_path.display(), e))
    })?;

    let mut mappings = Vec::new();
    for (index, row) in reader.deserialize::<MappingRow>().enumerate() {
        let line = index + 2;
        let row = row.map_err(|e| ToolkitError::InvalidInput(format!("row {}: {}", line, e)))?;
        let attribute_id = row.attribute_id.trim().parse::<i64>().map_err(|e| {
            ToolkitError::InvalidInput(format!(
                "row {}: attribute_id {:?} is not an integer: {}",
                line, row.attribute_id, e
            ))
        })?;
        let body: MappingBody = serde_json::from_str(&row.mapping).map_err(|e| {
            ToolkitError::InvalidInput(format!("row {}: invalid mapping JSON: {}", line, e))
        })?;
        mappings.push(Mapping {
            attribute_id,
            mapping: clean_mapping(body),
        });
    }

    Ok(mappings)
}

/// Converts a CSV mapping export into a mapping file, returning the record count.
pub fn convert_csv_to_mappings(csv_path: &Path, output_path: &Path) -> Result<usize> {
    let mappings = read_csv_mappings(csv_path)?;
    save_mappings(output_path, &mappings)?;
    tracing::info!(
        count = mappings.len(),
        output = %output_path.display(),
        "Converted CSV mappings"
    );
    Ok(mappings.len())
}
