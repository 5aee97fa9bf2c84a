#![allow(dead_code)]

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Mutex;

use s3_ingest::{
    Credentials, IngestError, IngestionPipeline, PipelineOptions, PutRequest, Result, Store,
};

pub const REGION: &str = "us-east-2";

/// In-memory store recording every put attempt
#[derive(Default)]
pub struct RecordingStore {
    attempts: Mutex<Vec<PutRequest>>,
    failing_buckets: Vec<String>,
}

impl RecordingStore {
    pub fn failing_bucket(bucket: &str) -> Self {
        Self {
            attempts: Mutex::new(Vec::new()),
            failing_buckets: vec![bucket.to_string()],
        }
    }

    pub fn attempts(&self) -> Vec<PutRequest> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn put(&self, request: PutRequest) -> Result<String> {
        let (bucket, key) = (request.bucket.clone(), request.key.clone());
        self.attempts.lock().unwrap().push(request);

        if self.failing_buckets.contains(&bucket) {
            return Err(IngestError::from_store_error(
                &bucket,
                &key,
                "AccessDenied: Access Denied",
            ));
        }
        Ok(format!("https://{}.s3.{}.amazonaws.com/{}", bucket, REGION, key))
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        region: REGION.to_string(),
        bucket: "files".to_string(),
        access_key: "AK".to_string(),
        secret_key: "SK".to_string(),
        acl: "private".to_string(),
    }
}

pub fn pipeline(store: RecordingStore) -> IngestionPipeline<RecordingStore> {
    IngestionPipeline::new(
        store,
        credentials(),
        PipelineOptions {
            max_concurrent: 4,
            timeout: None,
        },
    )
}

fn sample(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 251) as u8, (y % 241) as u8, 90])
    }))
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    sample(width, height)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    sample(width, height)
        .to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, 85))
        .unwrap();
    buf.into_inner()
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// In-memory payload of a recorded put
pub fn body_bytes(put: &PutRequest) -> &[u8] {
    put.body
        .as_bytes()
        .expect("image uploads carry an in-memory body")
}

pub fn decoded_size(bytes: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(bytes).unwrap();
    (img.width(), img.height())
}
