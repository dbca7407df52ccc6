//! Integration tests for multipart uploads
//!
//! With a 5 MiB threshold and 5 MiB parts, an 11 MiB object is sent as
//! three parts (5 + 5 + 1 MiB).

use bucketsync_core::ports::{IRemoteStore, StoreError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common;

const MIB: u64 = 1024 * 1024;
const UPLOAD_ID: &str = "upload-1";

async fn mount_create(server: &MockServer) {
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><InitiateMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Bucket>mirror</Bucket><Key>big.bin</Key><UploadId>{UPLOAD_ID}</UploadId></InitiateMultipartUploadResult>"#
    );

    Mock::given(method("POST"))
        .and(path("/mirror/big.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/xml")
                .set_body_string(body),
        )
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_complete(server: &MockServer, expected: u64) {
    let body = r#"<?xml version="1.0" encoding="UTF-8"?><CompleteMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Bucket>mirror</Bucket><Key>big.bin</Key><ETag>"final-3"</ETag></CompleteMultipartUploadResult>"#;

    Mock::given(method("POST"))
        .and(path("/mirror/big.bin"))
        .and(query_param("uploadId", UPLOAD_ID))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/xml")
                .set_body_string(body),
        )
        .with_priority(1)
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_parts(server: &MockServer, expected: u64) {
    Mock::given(method("PUT"))
        .and(path("/mirror/big.bin"))
        .and(query_param("uploadId", UPLOAD_ID))
        .respond_with(ResponseTemplate::new(200).insert_header("ETag", "\"part\""))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_large_object_uses_multipart_upload() {
    let (server, store) = common::setup_s3_mock().await;
    mount_create(&server).await;
    mount_parts(&server, 3).await;
    mount_complete(&server, 1).await;

    let data = vec![1u8; (11 * MIB) as usize];

    store
        .put_object(&common::key("big.bin"), common::body(data), 11 * MIB)
        .await
        .unwrap();

    let part_sizes: Vec<u64> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .map(|r| r.body.len() as u64)
        .collect();
    assert_eq!(part_sizes, vec![5 * MIB, 5 * MIB, MIB]);
}

#[tokio::test]
async fn test_body_ending_early_aborts_upload() {
    let (server, store) = common::setup_s3_mock().await;
    mount_create(&server).await;
    mount_parts(&server, 1).await;
    mount_complete(&server, 0).await;

    Mock::given(method("DELETE"))
        .and(path("/mirror/big.bin"))
        .and(query_param("uploadId", UPLOAD_ID))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    // Claims 11 MiB but only holds 7 MiB
    let err = store
        .put_object(
            &common::key("big.bin"),
            common::body(vec![0u8; (7 * MIB) as usize]),
            11 * MIB,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Source(_)), "got {err:?}");
}

#[tokio::test]
async fn test_failed_part_aborts_upload() {
    let (server, store) = common::setup_s3_mock().await;
    mount_create(&server).await;
    mount_complete(&server, 0).await;

    Mock::given(method("PUT"))
        .and(path("/mirror/big.bin"))
        .and(query_param("partNumber", "2"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("Content-Type", "application/xml")
                .set_body_string(common::error_body("AccessDenied", "Access Denied")),
        )
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    mount_parts(&server, 1).await;

    Mock::given(method("DELETE"))
        .and(path("/mirror/big.bin"))
        .and(query_param("uploadId", UPLOAD_ID))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let err = store
        .put_object(
            &common::key("big.bin"),
            common::body(vec![0u8; (11 * MIB) as usize]),
            11 * MIB,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::AccessDenied(_)), "got {err:?}");
}

#[tokio::test]
async fn test_object_below_threshold_uses_single_put() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/mirror/big.bin"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    store
        .put_object(
            &common::key("big.bin"),
            common::body(vec![0u8; (5 * MIB - 1) as usize]),
            5 * MIB - 1,
        )
        .await
        .unwrap();
}
