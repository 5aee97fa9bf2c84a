//! Browser-side upload authorization: a time-bounded POST policy document
//! signed with the SigV4 key derivation chain.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::debug;

use super::error::{IngestError, Result};
use crate::config::Credentials;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const POLICY_ACL: &str = "public-read";
pub const STORE_DOMAIN: &str = "s3.amazonaws.com";

const EXPIRATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
const TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const SHORT_TIME_FORMAT: &str = "%Y%m%d";
const SERVICE: &str = "s3";
const TERMINATOR: &str = "aws4_request";

pub const DEFAULT_EXPIRY_MINUTES: u32 = 15;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Constraints embedded into a signed policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyOptions {
    pub expiry_minutes: u32,
    pub max_file_size: u64,
    /// Prefix every uploaded key must start with; empty allows any key
    pub key_prefix: String,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            expiry_minutes: DEFAULT_EXPIRY_MINUTES,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            key_prefix: String::new(),
        }
    }
}

/// Form fields a browser posts alongside the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedPolicy {
    pub url: String,
    pub key: String,
    pub policy: String,
    #[serde(rename = "x-amz-credential")]
    pub credential: String,
    #[serde(rename = "x-amz-algorithm")]
    pub algorithm: String,
    #[serde(rename = "x-amz-signature")]
    pub signature: String,
    #[serde(rename = "x-amz-date")]
    pub date: String,
    pub acl: String,
}

/// Sign a POST policy for `credentials.bucket`, valid from `now` for
/// `options.expiry_minutes`.
///
/// The result embeds its own expiry, so callers must sign per request and
/// never cache it.
///
/// # Errors
///
/// Returns `IngestError::InvalidPolicyOptions` for an empty bucket, access key
/// or secret key, a zero size limit, or a zero expiry.
pub fn sign_policy(
    credentials: &Credentials,
    options: &PolicyOptions,
    now: DateTime<Utc>,
) -> Result<SignedPolicy> {
    validate(credentials, options)?;

    let expiry = now + Duration::minutes(i64::from(options.expiry_minutes));
    let date = now.format(TIME_FORMAT).to_string();
    let short_date = now.format(SHORT_TIME_FORMAT).to_string();
    let credential = credential_scope(&credentials.access_key, &short_date, &credentials.region);

    let document = policy_document(
        &expiry.format(EXPIRATION_FORMAT).to_string(),
        &credentials.bucket,
        &options.key_prefix,
        options.max_file_size,
        &credential,
        &date,
    );
    let policy = STANDARD.encode(document.as_bytes());

    let signing_key = derive_signing_key(&credentials.secret_key, &short_date, &credentials.region)?;
    let signature = hex::encode(hmac_sha256(&signing_key, policy.as_bytes())?);

    debug!(
        "Signed upload policy for bucket {} (scope {}, expires {})",
        credentials.bucket, credential, expiry
    );

    Ok(SignedPolicy {
        url: format!("https://{}.{}/", credentials.bucket, STORE_DOMAIN),
        key: options.key_prefix.clone(),
        policy,
        credential,
        algorithm: ALGORITHM.to_string(),
        signature,
        date,
        acl: POLICY_ACL.to_string(),
    })
}

/// Sign a policy against the system clock
pub fn sign_policy_now(credentials: &Credentials, options: &PolicyOptions) -> Result<SignedPolicy> {
    sign_policy(credentials, options, Utc::now())
}

fn validate(credentials: &Credentials, options: &PolicyOptions) -> Result<()> {
    if credentials.bucket.is_empty() {
        return Err(IngestError::InvalidPolicyOptions(
            "bucket cannot be empty".to_string(),
        ));
    }
    if credentials.access_key.is_empty() || credentials.secret_key.is_empty() {
        return Err(IngestError::InvalidPolicyOptions(
            "access key and secret key are required".to_string(),
        ));
    }
    if options.max_file_size == 0 {
        return Err(IngestError::InvalidPolicyOptions(
            "max file size must be positive".to_string(),
        ));
    }
    if options.expiry_minutes == 0 {
        return Err(IngestError::InvalidPolicyOptions(
            "expiry must be at least one minute".to_string(),
        ));
    }
    Ok(())
}

/// `accessKey/YYYYMMDD/region/s3/aws4_request`
pub fn credential_scope(access_key: &str, short_date: &str, region: &str) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        access_key, short_date, region, SERVICE, TERMINATOR
    )
}

fn policy_document(
    expiration: &str,
    bucket: &str,
    key_prefix: &str,
    max_file_size: u64,
    credential: &str,
    date: &str,
) -> String {
    // Values are substituted as JSON strings so quotes in a prefix cannot
    // break out of the document.
    let quote = |s: &str| serde_json::Value::String(s.to_string()).to_string();
    format!(
        "{{\"expiration\": {}, \"conditions\": [{{\"bucket\": {}}}, [\"starts-with\", \"$key\", {}], \
         {{\"acl\": \"{}\"}}, [\"content-length-range\", 1, {}], {{\"x-amz-credential\": {}}}, \
         {{\"x-amz-algorithm\": \"{}\"}}, {{\"x-amz-date\": {}}}]}}",
        quote(expiration),
        quote(bucket),
        quote(key_prefix),
        POLICY_ACL,
        max_file_size,
        quote(credential),
        ALGORITHM,
        quote(date),
    )
}

fn derive_signing_key(secret_key: &str, short_date: &str, region: &str) -> Result<Vec<u8>> {
    let date_key = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), short_date.as_bytes())?;
    let region_key = hmac_sha256(&date_key, region.as_bytes())?;
    let service_key = hmac_sha256(&region_key, SERVICE.as_bytes())?;
    hmac_sha256(&service_key, TERMINATOR.as_bytes())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| IngestError::InvalidPolicyOptions(format!("invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn credentials() -> Credentials {
        Credentials {
            region: "us-east-2".to_string(),
            bucket: "b".to_string(),
            access_key: "AK".to_string(),
            secret_key: "SK".to_string(),
            acl: "public-read".to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_sign_known_answer() {
        let signed = sign_policy(&credentials(), &PolicyOptions::default(), now()).unwrap();

        assert_eq!(signed.credential, "AK/20230101/us-east-2/s3/aws4_request");
        assert_eq!(signed.algorithm, "AWS4-HMAC-SHA256");
        assert_eq!(signed.acl, "public-read");
        assert_eq!(signed.date, "20230101T000000Z");
        assert_eq!(signed.url, "https://b.s3.amazonaws.com/");
        assert_eq!(
            signed.policy,
            "eyJleHBpcmF0aW9uIjogIjIwMjMtMDEtMDFUMDA6MTU6MDAuMDAwWiIsICJjb25kaXRpb25zIjogW3siYnVja2V0IjogImIifSwgWyJzdGFydHMtd2l0aCIsICIka2V5IiwgIiJdLCB7ImFjbCI6ICJwdWJsaWMtcmVhZCJ9LCBbImNvbnRlbnQtbGVuZ3RoLXJhbmdlIiwgMSwgMjA5NzE1MjBdLCB7IngtYW16LWNyZWRlbnRpYWwiOiAiQUsvMjAyMzAxMDEvdXMtZWFzdC0yL3MzL2F3czRfcmVxdWVzdCJ9LCB7IngtYW16LWFsZ29yaXRobSI6ICJBV1M0LUhNQUMtU0hBMjU2In0sIHsieC1hbXotZGF0ZSI6ICIyMDIzMDEwMVQwMDAwMDBaIn1dfQ=="
        );
        assert_eq!(
            signed.signature,
            "312059b43e4b5a163b5cf166167bf3d5af95e11ff3f72e424821d3bf8775d042"
        );
    }

    #[test]
    fn test_signature_shape() {
        let signed = sign_policy(&credentials(), &PolicyOptions::default(), now()).unwrap();
        assert_eq!(signed.signature.len(), 64);
        assert!(
            signed
                .signature
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign_policy(&credentials(), &PolicyOptions::default(), now()).unwrap();
        let b = sign_policy(&credentials(), &PolicyOptions::default(), now()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_any_input_change_changes_signature() {
        let base = sign_policy(&credentials(), &PolicyOptions::default(), now()).unwrap();

        let mut creds = credentials();
        creds.secret_key = "SL".to_string();
        let other = sign_policy(&creds, &PolicyOptions::default(), now()).unwrap();
        assert_ne!(base.signature, other.signature);
        assert_eq!(base.policy, other.policy);

        let mut creds = credentials();
        creds.bucket = "c".to_string();
        let other = sign_policy(&creds, &PolicyOptions::default(), now()).unwrap();
        assert_ne!(base.signature, other.signature);

        let options = PolicyOptions {
            expiry_minutes: 16,
            ..PolicyOptions::default()
        };
        let other = sign_policy(&credentials(), &options, now()).unwrap();
        assert_ne!(base.signature, other.signature);
    }

    #[test]
    fn test_policy_document_shape() {
        let options = PolicyOptions {
            key_prefix: "uploads/".to_string(),
            ..PolicyOptions::default()
        };
        let signed = sign_policy(&credentials(), &options, now()).unwrap();
        let raw = STANDARD.decode(&signed.policy).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&raw).unwrap();

        assert_eq!(doc["expiration"], "2023-01-01T00:15:00.000Z");
        let conditions = doc["conditions"].as_array().unwrap();
        assert_eq!(conditions.len(), 7);
        assert_eq!(conditions[0]["bucket"], "b");
        assert_eq!(
            conditions[1],
            serde_json::json!(["starts-with", "$key", "uploads/"])
        );
        assert_eq!(conditions[2]["acl"], "public-read");
        assert_eq!(
            conditions[3],
            serde_json::json!(["content-length-range", 1, 20971520])
        );
        assert_eq!(
            conditions[4]["x-amz-credential"],
            "AK/20230101/us-east-2/s3/aws4_request"
        );
        assert_eq!(conditions[5]["x-amz-algorithm"], "AWS4-HMAC-SHA256");
        assert_eq!(conditions[6]["x-amz-date"], "20230101T000000Z");
        assert_eq!(signed.key, "uploads/");
    }

    #[test]
    fn test_rejects_invalid_options() {
        let mut creds = credentials();
        creds.bucket.clear();
        assert!(matches!(
            sign_policy(&creds, &PolicyOptions::default(), now()),
            Err(IngestError::InvalidPolicyOptions(_))
        ));

        let options = PolicyOptions {
            max_file_size: 0,
            ..PolicyOptions::default()
        };
        assert!(matches!(
            sign_policy(&credentials(), &options, now()),
            Err(IngestError::InvalidPolicyOptions(_))
        ));

        let options = PolicyOptions {
            expiry_minutes: 0,
            ..PolicyOptions::default()
        };
        assert!(matches!(
            sign_policy(&credentials(), &options, now()),
            Err(IngestError::InvalidPolicyOptions(_))
        ));

        let mut creds = credentials();
        creds.secret_key.clear();
        assert!(sign_policy(&creds, &PolicyOptions::default(), now()).is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let signed = sign_policy(&credentials(), &PolicyOptions::default(), now()).unwrap();
        let json = serde_json::to_value(&signed).unwrap();
        for field in [
            "url",
            "key",
            "policy",
            "x-amz-credential",
            "x-amz-algorithm",
            "x-amz-signature",
            "x-amz-date",
            "acl",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
    }
}
