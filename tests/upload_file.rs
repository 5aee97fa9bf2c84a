mod common;

use common::{RecordingStore, pipeline};
use s3_ingest::{IngestError, PutBody};

#[tokio::test]
async fn file_uses_default_bucket_and_acl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, b"started\nready\n").unwrap();

    let pipeline = pipeline(RecordingStore::default());
    let location = pipeline
        .upload_file(&path, "logs", Some("app.log"))
        .await
        .unwrap();

    assert_eq!(location, "https://files.s3.us-east-2.amazonaws.com/logs/app.log");

    let attempts = pipeline.store().attempts();
    assert_eq!(attempts.len(), 1);
    let put = &attempts[0];
    assert_eq!(put.bucket, "files");
    assert_eq!(put.key, "logs/app.log");
    assert_eq!(put.acl, "private");
    assert_eq!(put.content_type.as_deref(), Some("text/plain"));
    assert_eq!(
        put.body,
        PutBody::File {
            path: path.clone(),
            len: 14,
        }
    );
    assert!(put.body.as_bytes().is_none());
    assert!(put.metadata.is_empty());
}

#[tokio::test]
async fn file_without_key_gets_generated_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    std::fs::write(&path, b"{}").unwrap();

    let pipeline = pipeline(RecordingStore::default());
    pipeline.upload_file(&path, "exports", None).await.unwrap();
    pipeline.upload_file(&path, "exports", None).await.unwrap();

    let keys: Vec<String> = pipeline
        .store()
        .attempts()
        .into_iter()
        .map(|put| put.key)
        .collect();
    assert_eq!(keys.len(), 2);
    assert_ne!(keys[0], keys[1]);
    for key in &keys {
        let id = key.strip_prefix("exports/").unwrap();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
    assert!(keys[0] < keys[1]);
}

#[tokio::test]
async fn missing_file_is_reported_without_upload() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(RecordingStore::default());

    let err = pipeline
        .upload_file(dir.path().join("nope.txt"), "logs", None)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::FileNotFound { .. }));
    assert!(pipeline.store().attempts().is_empty());
}

#[tokio::test]
async fn unsafe_folder_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, b"a").unwrap();

    let pipeline = pipeline(RecordingStore::default());
    let err = pipeline
        .upload_file(&path, "../outside", None)
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(pipeline.store().attempts().is_empty());
}

#[tokio::test]
async fn empty_key_falls_back_to_generated_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, b"x").unwrap();

    let pipeline = pipeline(RecordingStore::default());
    pipeline.upload_file(&path, "logs", Some("")).await.unwrap();

    let key = pipeline.store().attempts().remove(0).key;
    let id = key.strip_prefix("logs/").unwrap();
    assert_eq!(id.len(), 32);
}

#[tokio::test]
async fn directory_is_not_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(RecordingStore::default());

    let err = pipeline
        .upload_file(dir.path(), "logs", None)
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Io { .. }));
    assert!(pipeline.store().attempts().is_empty());
}
