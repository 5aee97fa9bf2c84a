use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::time::Duration;

use crate::s3::policy::{DEFAULT_EXPIRY_MINUTES, DEFAULT_MAX_FILE_SIZE, PolicyOptions};

pub const DEFAULT_ACL: &str = "public-read";
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// AWS credentials and bucket defaults, read-only once constructed
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    /// ACL applied to plain file uploads
    pub acl: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("acl", &self.acl)
            .finish()
    }
}

/// Worker pool settings for batch uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub max_concurrent: usize,
    /// Deadline for a whole batch; `None` waits for every item
    pub timeout: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout: None,
        }
    }
}

/// Configuration for signing and upload operations
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub policy: PolicyOptions,
    pub pipeline: PipelineOptions,
    pub target_path: String,
}

impl Config {
    /// Load configuration from environment variables and .env file
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if it exists

        let region = env::var("AWS_REGION")
            .context("AWS_REGION not found in environment. Please set it in .env file")?;
        Self::validate_region(&region)?;

        let bucket = env::var("S3_BUCKET")
            .context("S3_BUCKET not found in environment. Please set it in .env file")?;
        Self::validate_bucket_name(&bucket)?;

        let access_key = env::var("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID not found in environment. Please set it in .env file")?;
        let secret_key = env::var("AWS_SECRET_ACCESS_KEY").context(
            "AWS_SECRET_ACCESS_KEY not found in environment. Please set it in .env file",
        )?;

        let acl = env::var("S3_ACL").unwrap_or_else(|_| DEFAULT_ACL.to_string());

        let target_path = env::var("S3_TARGET_PATH").unwrap_or_default();
        Self::validate_target_path(&target_path)?;

        let expiry_minutes = parse_var("POLICY_EXPIRY_MINUTES", DEFAULT_EXPIRY_MINUTES)?;
        let max_file_size = parse_var("POLICY_MAX_FILE_SIZE", DEFAULT_MAX_FILE_SIZE)?;
        let max_concurrent = parse_var("UPLOAD_MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT)?;
        if max_concurrent == 0 {
            anyhow::bail!("UPLOAD_MAX_CONCURRENT must be at least 1");
        }
        let timeout = match env::var("UPLOAD_TIMEOUT_SECS") {
            Ok(secs) => Some(Duration::from_secs(secs.parse().with_context(|| {
                format!("UPLOAD_TIMEOUT_SECS '{}' is not a number of seconds", secs)
            })?)),
            Err(_) => None,
        };

        Ok(Self {
            credentials: Credentials {
                region,
                bucket,
                access_key,
                secret_key,
                acl,
            },
            policy: PolicyOptions {
                expiry_minutes,
                max_file_size,
                key_prefix: target_path.clone(),
            },
            pipeline: PipelineOptions {
                max_concurrent,
                timeout,
            },
            target_path,
        })
    }

    /// Validate AWS region format
    fn validate_region(region: &str) -> Result<()> {
        if region.is_empty() {
            anyhow::bail!("AWS_REGION cannot be empty");
        }

        // Basic validation - ensure it looks like a region (contains a dash)
        if !region.contains('-') {
            anyhow::bail!(
                "AWS_REGION '{}' doesn't look like a valid region (e.g., us-west-2, eu-west-1)",
                region
            );
        }

        Ok(())
    }

    /// Validate S3 bucket name according to AWS rules
    fn validate_bucket_name(bucket: &str) -> Result<()> {
        if bucket.len() < 3 || bucket.len() > 63 {
            anyhow::bail!(
                "S3_BUCKET '{}' must be between 3 and 63 characters (got {})",
                bucket,
                bucket.len()
            );
        }

        let is_edge = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
        if !bucket.starts_with(is_edge) {
            anyhow::bail!(
                "S3_BUCKET '{}' must start with a lowercase letter or number",
                bucket
            );
        }
        if !bucket.ends_with(is_edge) {
            anyhow::bail!(
                "S3_BUCKET '{}' must end with a lowercase letter or number",
                bucket
            );
        }

        if let Some(c) = bucket
            .chars()
            .find(|&c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '.')
        {
            anyhow::bail!(
                "S3_BUCKET '{}' contains invalid character '{}'. Only lowercase letters, numbers, hyphens, and periods are allowed",
                bucket,
                c
            );
        }

        if bucket.contains("..") {
            anyhow::bail!("S3_BUCKET '{}' cannot contain consecutive periods", bucket);
        }

        // IP address format is not allowed
        if bucket
            .split('.')
            .all(|part| part.parse::<u8>().is_ok() && !part.is_empty())
        {
            anyhow::bail!(
                "S3_BUCKET '{}' cannot be formatted as an IP address",
                bucket
            );
        }

        Ok(())
    }

    /// Validate S3 target path
    pub fn validate_target_path(path: &str) -> Result<()> {
        if let Some(reason) = folder_violation(path) {
            anyhow::bail!("S3_TARGET_PATH '{}' {}", path, reason);
        }
        Ok(())
    }
}

/// Why a folder cannot be used as a key prefix, if it cannot
pub(crate) fn folder_violation(path: &str) -> Option<&'static str> {
    if path.contains("//") {
        Some("contains consecutive slashes (not allowed)")
    } else if path.contains("..") {
        Some("contains '..' (not allowed for security)")
    } else if path.starts_with('/') {
        Some("should not start with '/' (use relative path)")
    } else {
        None
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", name, value)),
        Err(_) => Ok(default),
    }
}
