use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// Supported image formats
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "dng", "jpeg", "jpg", "mpo", "png", "tif", "tiff", "webp", "pfm",
];

/// Key count of an annotation record without a bounding box
pub const ANNOTATION_KEYS_WITHOUT_BBOX: usize = 4;
/// Key count of an annotation record carrying a bounding box
pub const ANNOTATION_KEYS_WITH_BBOX: usize = 5;
/// Key count of a metadata record for an empty image (no `animal_type`)
pub const METADATA_KEYS_EMPTY: usize = 8;
/// Key count of a metadata record that names an animal type
pub const METADATA_KEYS_ANIMAL: usize = 9;

/// Identifier of an image or annotation.
///
/// Both integer and string ids show up in the wild, so the value is kept as
/// whichever JSON type it arrived as and compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{}", id),
            RecordId::Str(id) => write!(f, "\"{}\"", id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Int(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::Str(id.to_string())
    }
}

// Keeps a key that is present with a `null` value distinguishable from a missing key
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// A category entry of the dataset's `categories` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub id: u32,
}

/// The dataset's `info` block; only `version` is touched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Info {
    /// Any JSON type is accepted on input; the rewrite always stores a string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An image record of the original dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: RecordId,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habitat_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageRecord {
    pub fn new(id: impl Into<RecordId>, file_name: &str) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.to_string(),
            filter: None,
            habitat_type: None,
            visibility: None,
            extra: Map::new(),
        }
    }
}

/// An annotation record of the original dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub id: RecordId,
    pub image_id: RecordId,
    pub category_id: u32,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub bbox: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnnotationRecord {
    pub fn new(id: impl Into<RecordId>, image_id: impl Into<RecordId>, category_id: u32) -> Self {
        Self {
            id: id.into(),
            image_id: image_id.into(),
            category_id,
            bbox: None,
            extra: Map::new(),
        }
    }

    /// Number of keys the record had in its JSON object
    pub fn key_count(&self) -> usize {
        3 + usize::from(self.bbox.is_some()) + self.extra.len()
    }
}

/// The complete COCO-style dataset; unknown top-level keys pass through untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub info: Info,
    pub images: Vec<ImageRecord>,
    pub annotations: Vec<AnnotationRecord>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A per-image record of the new metadata file.
///
/// The attribute fields stay as raw JSON values so that a wrong type is
/// reported against the record instead of failing the whole parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataImage {
    pub id: RecordId,
    pub file_name: String,
    pub filter: Value,
    pub standardized_habitat_type: Value,
    pub visibility: Value,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub animal_type: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetadataImage {
    pub fn key_count(&self) -> usize {
        5 + usize::from(self.animal_type.is_some()) + self.extra.len()
    }
}

/// The new metadata document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataFile {
    pub images: Vec<MetadataImage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
