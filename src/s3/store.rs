use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

use super::error::Result;

/// Object payload: encoded image bytes already in memory, or a local file
/// streamed from disk by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutBody {
    Bytes(Vec<u8>),
    File { path: PathBuf, len: u64 },
}

impl PutBody {
    pub fn len(&self) -> u64 {
        match self {
            Self::Bytes(bytes) => bytes.len() as u64,
            Self::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// In-memory bytes, `None` for a file body
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::File { .. } => None,
        }
    }
}

impl From<Vec<u8>> for PutBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

/// A single object write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub bucket: String,
    pub key: String,
    pub body: PutBody,
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
    pub acl: String,
}

impl PutRequest {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, body: impl Into<PutBody>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            body: body.into(),
            content_type: None,
            metadata: HashMap::new(),
            acl: crate::config::DEFAULT_ACL.to_string(),
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn acl(mut self, acl: impl Into<String>) -> Self {
        self.acl = acl.into();
        self
    }

    /// Attach `width`/`height` custom metadata
    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.metadata.insert("width".to_string(), width.to_string());
        self.metadata.insert("height".to_string(), height.to_string());
        self
    }
}

/// The object store capability the pipeline uploads through.
///
/// Implementations return the public location of the stored object, or an
/// `IngestError::Upload` describing why the store rejected it.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn put(&self, request: PutRequest) -> Result<String>;
}
