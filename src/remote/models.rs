// ABOUTME: Data structures for dataset, mapping, file listing and upload payloads
// ABOUTME: These are serialized to JSON for API communication and for the mapping export file

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier the API may send either as a number or as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteId {
    Number(i64),
    Text(String),
}

impl RemoteId {
    /// Numeric ids given on the command line are sent back as numbers.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(n) => RemoteId::Number(n),
            Err(_) => RemoteId::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RemoteId::Number(n) => write!(f, "{}", n),
            RemoteId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Local snapshot of a remote dataset.
///
/// The fetched JSON object is kept as is and the fields the workflows need are
/// read through accessors, so an update writes the dataset back without losing
/// data (explicit `null`s included).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    pub fields: Map<String, Value>,
}

impl Dataset {
    /// `None` when the key is absent, `null` or not an id.
    pub fn company_id(&self) -> Option<RemoteId> {
        self.fields
            .get("company_id")
            .and_then(|raw| RemoteId::deserialize(raw).ok())
    }

    /// Typed view of the dataset's mappings.
    pub fn typed_mappings(&self) -> serde_json::Result<Vec<Mapping>> {
        match self.fields.get("mappings") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(raw) => Vec::<Mapping>::deserialize(raw),
        }
    }

    /// The `schema.properties` object, keyed by field name.
    pub fn schema_properties(&self) -> Option<&Map<String, Value>> {
        self.fields.get("schema")?.get("properties")?.as_object()
    }

    pub fn schema_properties_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.fields
            .get_mut("schema")?
            .get_mut("properties")?
            .as_object_mut()
    }

    pub fn has_field(&self, field_name: &str) -> bool {
        self.schema_properties()
            .is_some_and(|properties| properties.contains_key(field_name))
    }
}

/// One `{attribute_id, mapping}` record, the unit of the mapping export file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub attribute_id: i64,
    pub mapping: MappingBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingBody {
    ValueMapping(ValueMapping),
    ObjectMapping(ObjectMapping),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueMapping {
    pub expression: Expression,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMapping {
    pub property_mappings: Vec<PropertyMapping>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyMapping {
    pub expression: Expression,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A mapping expression: either the bare expression text or a wrapper that
/// tags the text (under `value`) with the query dialect it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expression {
    Plain(String),
    Tagged(TaggedExpression),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedExpression {
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingRequest<'a> {
    pub dataset_id: &'a RemoteId,
    pub attribute_id: i64,
    pub mapping: &'a MappingBody,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FindFilesPage {
    #[serde(default)]
    pub files_per_snapshot: Vec<SnapshotFiles>,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub next_snapshot: Option<RemoteId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SnapshotFiles {
    pub snapshot_id: RemoteId,
    #[serde(default)]
    pub is_downloadable: bool,
    #[serde(default)]
    pub files: Vec<RemoteFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteFile {
    pub path: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadLink {
    pub download_url: Option<String>,
}

/// Single-use signed write target for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadSlot {
    pub url: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadNotification<'a> {
    pub source_file: &'a str,
}
