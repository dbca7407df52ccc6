//! Integration tests for bucket existence checks and creation

use bucketsync_core::ports::{IRemoteStore, StoreError};
use bucketsync_store::{ensure_bucket, BucketStatus};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_bucket_exists_true_on_200() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path("/mirror"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert!(store.bucket_exists().await.unwrap());
}

#[tokio::test]
async fn test_bucket_exists_false_on_404() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path("/mirror"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(!store.bucket_exists().await.unwrap());
}

#[tokio::test]
async fn test_bucket_exists_maps_403_to_access_denied() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path("/mirror"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = store.bucket_exists().await.unwrap_err();
    assert!(matches!(err, StoreError::AccessDenied(_)), "got {err:?}");
}

#[tokio::test]
async fn test_ensure_bucket_creates_missing_bucket() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path("/mirror"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/mirror"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let status = ensure_bucket(&store).await.unwrap();
    assert_eq!(status, BucketStatus::Created);
}

#[tokio::test]
async fn test_ensure_bucket_skips_creation_when_present() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("HEAD"))
        .and(path("/mirror"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/mirror"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let status = ensure_bucket(&store).await.unwrap();
    assert_eq!(status, BucketStatus::Existed);
}

#[tokio::test]
async fn test_create_bucket_failure_is_reported() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("PUT"))
        .and(path("/mirror"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("Content-Type", "application/xml")
                .set_body_string(common::error_body("AccessDenied", "Access Denied")),
        )
        .mount(&server)
        .await;

    let err = store.create_bucket().await.unwrap_err();
    assert!(matches!(err, StoreError::AccessDenied(_)), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let (server, store) = common::setup_s3_mock().await;
    drop(server);

    let err = store.bucket_exists().await.unwrap_err();
    assert!(matches!(err, StoreError::Transport(_)), "got {err:?}");
}
