//! Integration tests for single-request uploads and deletions

use bucketsync_core::ports::{IRemoteStore, StoreError};
use wiremock::matchers::{body_bytes, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_put_object_sends_content_to_key_path() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("PUT"))
        .and(path("/mirror/sub/b.txt"))
        .and(body_bytes(b"hello bucket".to_vec()))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"abc\""))
        .expect(1)
        .mount(&server)
        .await;

    store
        .put_object(&common::key("sub/b.txt"), common::body(b"hello bucket".to_vec()), 12)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_put_object_with_short_body_sends_nothing() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = store
        .put_object(&common::key("a.txt"), common::body(vec![7u8; 10]), 42)
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Source(_)), "got {err:?}");
}

#[tokio::test]
async fn test_put_object_access_denied() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("PUT"))
        .and(path("/mirror/a.txt"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("Content-Type", "application/xml")
                .set_body_string(common::error_body("AccessDenied", "Access Denied")),
        )
        .mount(&server)
        .await;

    let err = store
        .put_object(&common::key("a.txt"), common::body(b"x".to_vec()), 1)
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::AccessDenied(_)), "got {err:?}");
}

#[tokio::test]
async fn test_put_object_missing_bucket_is_not_found() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("PUT"))
        .and(path("/mirror/a.txt"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("Content-Type", "application/xml")
                .set_body_string(common::error_body(
                    "NoSuchBucket",
                    "The specified bucket does not exist",
                )),
        )
        .mount(&server)
        .await;

    let err = store
        .put_object(&common::key("a.txt"), common::body(b"x".to_vec()), 1)
        .await
        .unwrap_err();

    assert!(err.is_not_found(), "got {err:?}");
}

#[tokio::test]
async fn test_delete_object_sends_delete() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/mirror/old.txt"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store.delete_object(&common::key("old.txt")).await.unwrap();
}

#[tokio::test]
async fn test_delete_object_error_is_reported() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("DELETE"))
        .and(path("/mirror/old.txt"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("Content-Type", "application/xml")
                .set_body_string(common::error_body("AccessDenied", "Access Denied")),
        )
        .mount(&server)
        .await;

    let err = store.delete_object(&common::key("old.txt")).await.unwrap_err();
    assert!(matches!(err, StoreError::AccessDenied(_)), "got {err:?}");
}
