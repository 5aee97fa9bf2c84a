use serde::Serialize;
use std::path::PathBuf;

use crate::config::folder_violation;
use crate::s3::error::{IngestError, Result};

/// Where an item lands in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub bucket: String,
    pub folder: String,
    /// Object id; a fresh sortable id is generated when unset
    pub key: Option<String>,
}

impl UploadTarget {
    pub fn new(bucket: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            folder: folder.into(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_location(&self.bucket, &self.folder)
    }
}

/// Thumbnail request attached to an image upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeSpec {
    /// Thumbnails are only produced for sources strictly wider than this
    pub max_width_to_resize: u32,
    /// 0 falls back to 128 px
    pub width: u32,
    /// 0 derives the height from the source aspect ratio
    pub height: u32,
    pub bucket: String,
    pub folder: String,
}

impl ResizeSpec {
    pub(crate) fn validate(&self) -> Result<()> {
        validate_location(&self.bucket, &self.folder)
    }
}

fn validate_location(bucket: &str, folder: &str) -> Result<()> {
    if bucket.trim().is_empty() {
        return Err(IngestError::InvalidTarget("bucket is required".to_string()));
    }
    if let Some(reason) = folder_violation(folder) {
        return Err(IngestError::InvalidTarget(format!(
            "folder '{}' {}",
            folder, reason
        )));
    }
    Ok(())
}

/// Outcome of one image upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub location: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Box<UploadResult>>,
    /// Set when a thumbnail was due but could not be produced or stored;
    /// the primary upload still succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_error: Option<String>,
}

impl UploadResult {
    pub fn thumbnail_failed(&self) -> bool {
        self.thumbnail_error.is_some()
    }
}

/// Where image bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Image file on local disk; its type is sniffed from the bytes
    File(PathBuf),
    /// `data:<mime>;base64,<payload>`; its type comes from the declared MIME
    DataUri(String),
    /// Image bytes already in memory; sniffed like a file
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Short label for logs
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::DataUri(uri) => format!("data URI ({} chars)", uri.len()),
            Self::Bytes(bytes) => format!("{} in-memory bytes", bytes.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub source: ImageSource,
    pub target: UploadTarget,
    pub resize: Option<ResizeSpec>,
}

/// A plain file stored under the default bucket and ACL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub path: PathBuf,
    pub folder: String,
    pub key: Option<String>,
}

/// One unit of work in a mixed batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestItem {
    RawFile(FileUpload),
    Image(ImageUpload),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestOutput {
    File { location: String },
    Image(UploadResult),
}

impl IngestOutput {
    pub fn location(&self) -> &str {
        match self {
            Self::File { location } => location,
            Self::Image(result) => &result.location,
        }
    }
}

/// Index-aligned outcome of a batch: for every input `i` exactly one of
/// `results[i]` and `errors[i]` is `Some`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome<T> {
    pub results: Vec<Option<T>>,
    pub errors: Vec<Option<IngestError>>,
}

impl<T> BatchOutcome<T> {
    pub(crate) fn from_slots(slots: Vec<Result<T>>) -> Self {
        let mut results = Vec::with_capacity(slots.len());
        let mut errors = Vec::with_capacity(slots.len());
        for slot in slots {
            match slot {
                Ok(value) => {
                    results.push(Some(value));
                    errors.push(None);
                }
                Err(e) => {
                    results.push(None);
                    errors.push(Some(e));
                }
            }
        }
        Self { results, errors }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }

    pub fn failed(&self) -> usize {
        self.errors.iter().filter(|e| e.is_some()).count()
    }

    /// Slot `i` as a `Result`
    pub fn get(&self, index: usize) -> Option<std::result::Result<&T, &IngestError>> {
        match (self.results.get(index)?, self.errors.get(index)?) {
            (Some(value), _) => Some(Ok(value)),
            (None, Some(e)) => Some(Err(e)),
            (None, None) => None,
        }
    }

    pub fn into_results(self) -> Vec<Result<T>> {
        self.results
            .into_iter()
            .zip(self.errors)
            .map(|(result, error)| match (result, error) {
                (Some(value), _) => Ok(value),
                (None, Some(e)) => Err(e),
                (None, None) => Err(IngestError::WorkerFailed(
                    "slot left without an outcome".to_string(),
                )),
            })
            .collect()
    }
}
