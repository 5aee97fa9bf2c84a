use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::Credentials as AwsCredentials,
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use tracing::{debug, error, info};

use super::error::{IngestError, Result};
use super::store::{PutBody, PutRequest, Store};
use crate::config::Credentials;

/// `Store` backed by aws-sdk-s3 with static credentials
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    region: String,
}

impl S3Store {
    pub async fn new(credentials: &Credentials) -> Self {
        let static_credentials = AwsCredentials::new(
            credentials.access_key.clone(),
            credentials.secret_key.clone(),
            None,
            None,
            "s3-ingest",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(credentials.region.clone()))
            .credentials_provider(static_credentials)
            .load()
            .await;

        info!("Initialized S3 store for region {}", credentials.region);

        Self {
            client: Client::new(&sdk_config),
            region: credentials.region.clone(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Virtual-hosted-style URL of an object
    pub fn location(&self, bucket: &str, key: &str) -> String {
        format!("https://{}.s3.{}.amazonaws.com/{}", bucket, self.region, key)
    }
}

#[async_trait]
impl Store for S3Store {
    async fn put(&self, request: PutRequest) -> Result<String> {
        let PutRequest {
            bucket,
            key,
            body,
            content_type,
            metadata,
            acl,
        } = request;

        debug!("Uploading {} bytes to s3://{}/{}", body.len(), bucket, key);

        let content_length = body.len() as i64;
        let stream = match body {
            PutBody::Bytes(bytes) => ByteStream::from(bytes),
            // Create ByteStream from file
            PutBody::File { path, .. } => ByteStream::from_path(&path).await.map_err(|e| {
                IngestError::Io {
                    path: path.display().to_string(),
                    message: format!("Failed to create byte stream from file: {}", e),
                }
            })?,
        };

        let result = self
            .client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .body(stream)
            .content_length(content_length)
            .set_content_type(content_type)
            .set_metadata((!metadata.is_empty()).then_some(metadata))
            .acl(ObjectCannedAcl::from(acl.as_str()))
            .send()
            .await;

        match result {
            Ok(_) => {
                let location = self.location(&bucket, &key);
                debug!("Uploaded s3://{}/{} -> {}", bucket, key, location);
                Ok(location)
            }
            Err(e) => {
                let message = aws_sdk_s3::error::DisplayErrorContext(&e).to_string();
                error!("Upload failed for s3://{}/{}: {}", bucket, key, message);
                Err(IngestError::from_store_error(&bucket, &key, message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_location_format() {
        let store = S3Store::new(&Credentials {
            region: "us-east-2".to_string(),
            bucket: "photos".to_string(),
            access_key: "AK".to_string(),
            secret_key: "SK".to_string(),
            acl: "public-read".to_string(),
        })
        .await;

        assert_eq!(
            store.location("photos", "avatars/abc.png"),
            "https://photos.s3.us-east-2.amazonaws.com/avatars/abc.png"
        );
    }
}
