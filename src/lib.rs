//! Signed browser-upload policies for S3 plus a concurrent ingestion pipeline
//! that stores files and images, generating thumbnails on the way.

pub mod config;
pub mod imaging;
pub mod pipeline;
pub mod s3;

pub use config::{Config, Credentials, PipelineOptions};
pub use imaging::{DataUri, ImageContentType, ImageDescriptor};
pub use pipeline::{
    BatchOutcome, FileUpload, ImageSource, ImageUpload, IngestItem, IngestOutput,
    IngestionPipeline, ProgressCallback, ResizeSpec, UploadResult, UploadTarget,
};
pub use s3::{
    IngestError, PolicyOptions, PutBody, PutRequest, Result, S3Store, SignedPolicy, Store,
    sign_policy, sign_policy_now,
};
