//! Upload pipeline: sniff, decode, store the original, then optionally
//! resize and store a thumbnail. Batches run on a bounded worker pool.

mod batch;
pub mod types;

pub use batch::ProgressCallback;

use std::path::Path;
use std::sync::Arc;
use tokio::task;
use tracing::{debug, info, warn};

use crate::config::{Credentials, PipelineOptions};
use crate::imaging::{self, DataUri, ImageContentType, ImageDescriptor};
use crate::s3::error::{IngestError, Result};
use crate::s3::helpers::detect_content_type;
use crate::s3::policy::POLICY_ACL;
use crate::s3::store::{PutBody, PutRequest, Store};

pub use types::{
    BatchOutcome, FileUpload, ImageSource, ImageUpload, IngestItem, IngestOutput, ResizeSpec,
    UploadResult, UploadTarget,
};

/// Uploads files and images through a `Store`.
///
/// Cloning is cheap; clones share the store and credentials.
pub struct IngestionPipeline<S: Store> {
    store: Arc<S>,
    credentials: Arc<Credentials>,
    options: PipelineOptions,
    progress: Option<ProgressCallback>,
}

impl<S: Store> Clone for IngestionPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            credentials: Arc::clone(&self.credentials),
            options: self.options.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl<S: Store> IngestionPipeline<S> {
    pub fn new(store: S, credentials: Credentials, options: PipelineOptions) -> Self {
        Self::from_shared(Arc::new(store), Arc::new(credentials), options)
    }

    pub fn from_shared(
        store: Arc<S>,
        credentials: Arc<Credentials>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            credentials,
            options,
            progress: None,
        }
    }

    /// Report every finished batch item as `(input index, succeeded)`.
    ///
    /// The callback runs on the result collector, once per item, in
    /// completion order.
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(usize, bool) + Send + Sync + 'static,
    {
        let progress: ProgressCallback = Arc::new(progress);
        self.progress = Some(progress);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Upload one image and, when `resize` asks for it, a thumbnail.
    ///
    /// The original is stored under `{folder}/{id}{ext}` with a public-read
    /// ACL and `width`/`height` metadata. A thumbnail is attempted only when
    /// the source is wider than `resize.max_width_to_resize`; if that fails
    /// the result carries `thumbnail_error` instead of a thumbnail and the
    /// call still succeeds.
    ///
    /// # Errors
    ///
    /// - `InvalidTarget` before any I/O if a bucket is empty or a folder is unsafe
    /// - `MalformedDataUri` / `Decode` / `UnsupportedFormat` before any upload
    /// - `Upload` if the store rejects the original
    pub async fn upload_image(
        &self,
        source: ImageSource,
        target: UploadTarget,
        resize: Option<ResizeSpec>,
    ) -> Result<UploadResult> {
        target.validate()?;
        if let Some(spec) = &resize {
            spec.validate()?;
        }

        let label = source.describe();
        let (bytes, content_type) = load_image(source).await?;
        let mut descriptor =
            task::spawn_blocking(move || imaging::decode(bytes, content_type))
                .await
                .map_err(|e| IngestError::WorkerFailed(e.to_string()))??;

        let id = explicit_key(target.key.as_deref()).unwrap_or_else(generate_id);
        let key = object_key(&target.folder, &id, content_type.extension());
        let (width, height) = (descriptor.width, descriptor.height);

        debug!(
            "Uploading image {} ({}x{}, {}) as s3://{}/{}",
            label, width, height, content_type, target.bucket, key
        );

        let request = PutRequest::new(&target.bucket, &key, std::mem::take(&mut descriptor.bytes))
            .content_type(content_type.mime())
            .acl(POLICY_ACL)
            .dimensions(width, height);
        let location = self.store.put(request).await?;

        info!("Uploaded {} -> {}", label, location);

        let mut result = UploadResult {
            location,
            width,
            height,
            thumbnail: None,
            thumbnail_error: None,
        };

        if let Some(spec) = resize.filter(|spec| width > spec.max_width_to_resize) {
            match self.upload_thumbnail(descriptor, &spec, &id).await {
                Ok(thumbnail) => result.thumbnail = Some(Box::new(thumbnail)),
                Err(e) => {
                    warn!("Thumbnail for {} dropped: {}", result.location, e);
                    result.thumbnail_error = Some(e.to_string());
                }
            }
        }

        Ok(result)
    }

    async fn upload_thumbnail(
        &self,
        descriptor: ImageDescriptor,
        spec: &ResizeSpec,
        id: &str,
    ) -> Result<UploadResult> {
        let (width, height) = (spec.width, spec.height);
        let thumbnail = task::spawn_blocking(move || imaging::resize(&descriptor, width, height))
            .await
            .map_err(|e| IngestError::WorkerFailed(e.to_string()))??;

        let content_type = thumbnail.content_type;
        let key = object_key(&spec.folder, id, content_type.extension());
        let (width, height) = (thumbnail.width, thumbnail.height);

        let request = PutRequest::new(&spec.bucket, &key, thumbnail.into_bytes())
            .content_type(content_type.mime())
            .acl(POLICY_ACL)
            .dimensions(width, height);
        let location = self.store.put(request).await?;

        debug!("Uploaded {}x{} thumbnail -> {}", width, height, location);

        Ok(UploadResult {
            location,
            width,
            height,
            thumbnail: None,
            thumbnail_error: None,
        })
    }

    /// Upload a plain file to the default bucket with the default ACL.
    ///
    /// The object key is `{folder}/{key}`, or `{folder}/{generated id}` when
    /// `key` is `None` or empty. The file is streamed from disk by the store
    /// rather than read into memory. Store errors are returned unchanged.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        folder: &str,
        key: Option<&str>,
    ) -> Result<String> {
        let path = path.as_ref();
        UploadTarget::new(&self.credentials.bucket, folder).validate()?;

        let display = path.display().to_string();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| IngestError::from_io_error(e, &display))?;
        if !metadata.is_file() {
            return Err(IngestError::Io {
                path: display,
                message: "not a regular file".to_string(),
            });
        }

        let id = explicit_key(key).unwrap_or_else(generate_id);
        let object_key = object_key(folder, &id, "");

        info!(
            "Uploading file {} ({} bytes) to s3://{}/{}",
            path.display(),
            metadata.len(),
            self.credentials.bucket,
            object_key
        );

        let body = PutBody::File {
            path: path.to_path_buf(),
            len: metadata.len(),
        };
        let mut request = PutRequest::new(&self.credentials.bucket, &object_key, body)
            .acl(&self.credentials.acl);
        if let Some(content_type) = detect_content_type(path) {
            request = request.content_type(content_type);
        }

        self.store.put(request).await
    }

    /// Process one item of either kind
    pub async fn ingest(&self, item: IngestItem) -> Result<IngestOutput> {
        match item {
            IngestItem::RawFile(file) => self
                .upload_file(&file.path, &file.folder, file.key.as_deref())
                .await
                .map(|location| IngestOutput::File { location }),
            IngestItem::Image(upload) => self
                .upload_image(upload.source, upload.target, upload.resize)
                .await
                .map(IngestOutput::Image),
        }
    }

    /// Upload images concurrently; see [`BatchOutcome`] for the result shape
    pub async fn upload_images(&self, items: Vec<ImageUpload>) -> BatchOutcome<UploadResult> {
        self.run_batch(items, |pipeline, upload: ImageUpload| async move {
            pipeline
                .upload_image(upload.source, upload.target, upload.resize)
                .await
        })
        .await
    }

    /// Upload plain files concurrently, yielding one location per file
    pub async fn upload_files(&self, items: Vec<FileUpload>) -> BatchOutcome<String> {
        self.run_batch(items, |pipeline, file: FileUpload| async move {
            pipeline
                .upload_file(&file.path, &file.folder, file.key.as_deref())
                .await
        })
        .await
    }

    /// Run a mixed batch of files and images
    pub async fn ingest_batch(&self, items: Vec<IngestItem>) -> BatchOutcome<IngestOutput> {
        self.run_batch(items, |pipeline, item: IngestItem| async move {
            pipeline.ingest(item).await
        })
        .await
    }
}

async fn load_image(source: ImageSource) -> Result<(Vec<u8>, ImageContentType)> {
    match source {
        ImageSource::File(path) => {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| IngestError::from_io_error(e, &path.display().to_string()))?;
            let content_type = ImageContentType::sniff(&bytes);
            Ok((bytes, content_type))
        }
        ImageSource::DataUri(uri) => {
            let uri = DataUri::parse(&uri)?;
            Ok((uri.decode_payload()?, uri.content_type()))
        }
        ImageSource::Bytes(bytes) => {
            let content_type = ImageContentType::sniff(&bytes);
            Ok((bytes, content_type))
        }
    }
}

/// Caller-supplied object id; an empty key counts as absent
fn explicit_key(key: Option<&str>) -> Option<String> {
    key.filter(|k| !k.is_empty()).map(str::to_string)
}

/// Time-ordered unique id; lexicographic order follows creation order
pub fn generate_id() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

/// `{folder}/{id}{extension}`, without a leading slash for an empty folder
pub fn object_key(folder: &str, id: &str, extension: &str) -> String {
    let folder = folder.trim_end_matches('/');
    if folder.is_empty() {
        format!("{}{}", id, extension)
    } else {
        format!("{}/{}{}", folder, id, extension)
    }
}
