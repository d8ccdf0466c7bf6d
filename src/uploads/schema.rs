use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A stored upload. Immutable once recorded; removed together with its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: String,
    /// Server-side location; kept out of API responses.
    #[serde(skip_serializing, default)]
    pub storage_path: PathBuf,
    pub original_name: String,
    pub uploaded_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Row returned by `FileStore::list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub has_extraction: bool,
}

/// Everything `FileStore::read` knows about one upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFile {
    #[serde(skip)]
    pub content: Vec<u8>,
    pub metadata: UploadedFile,
    pub extraction: Option<Extraction>,
}

/// Outcome of running the extraction engine over one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Extraction {
    Extracted(ExtractionResult),
    Failed(ExtractionError),
}

impl Extraction {
    pub fn result(&self) -> Option<&ExtractionResult> {
        match self {
            Extraction::Extracted(result) => Some(result),
            Extraction::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ExtractionError> {
        match self {
            Extraction::Extracted(_) => None,
            Extraction::Failed(err) => Some(err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionError {
    pub message: String,
}

/// Structured summary of a markup document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Heading level (1-6) to heading texts. Levels without headings are absent.
    pub headings_by_level: BTreeMap<u8, Vec<String>>,
    pub paragraphs: Vec<String>,
    pub links: Vec<Link>,
    pub images: Vec<Image>,
    pub forms: Vec<Form>,
    pub meta_tags: Vec<MetaTag>,
    pub raw_text: String,
    pub structure_stats: StructureStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub href: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub src: String,
    pub alt: Option<String>,
    pub title: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    pub action: Option<String>,
    pub method: String,
    pub inputs: Vec<FormInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormInput {
    /// The `type` attribute, or the tag name when the attribute is missing.
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTag {
    pub name: Option<String>,
    pub property: Option<String>,
    pub content: Option<String>,
    pub charset: Option<String>,
}

impl MetaTag {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.property.is_none()
            && self.content.is_none()
            && self.charset.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureStats {
    pub total_elements: usize,
    pub div_count: usize,
    pub span_count: usize,
    pub table_count: usize,
    /// `ul` and `ol` together.
    pub list_count: usize,
    pub script_count: usize,
    pub style_count: usize,
}
