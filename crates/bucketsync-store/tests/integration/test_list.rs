//! Integration tests for listing objects by prefix

use bucketsync_core::ports::{IRemoteStore, StoreError};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

fn listing(keys: &[&str], next_token: Option<&str>) -> String {
    let contents: String = keys
        .iter()
        .map(|k| format!("<Contents><Key>{k}</Key><Size>1</Size></Contents>"))
        .collect();
    let truncation = match next_token {
        Some(token) => format!(
            "<IsTruncated>true</IsTruncated><NextContinuationToken>{token}</NextContinuationToken>"
        ),
        None => "<IsTruncated>false</IsTruncated>".to_string(),
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>mirror</Name><Prefix>sub/</Prefix><KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys>{truncation}{contents}</ListBucketResult>"#,
        keys.len()
    )
}

fn xml(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Content-Type", "application/xml")
        .set_body_string(body)
}

#[tokio::test]
async fn test_list_objects_sends_prefix() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("GET"))
        .and(path("/mirror"))
        .and(query_param("list-type", "2"))
        .and(query_param("prefix", "sub/"))
        .respond_with(xml(listing(&["sub/a.txt", "sub/deep/b.txt"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let keys: Vec<String> = store
        .list_objects("sub/")
        .await
        .unwrap()
        .iter()
        .map(|k| k.as_str().to_string())
        .collect();

    assert_eq!(keys, vec!["sub/a.txt", "sub/deep/b.txt"]);
}

#[tokio::test]
async fn test_list_objects_follows_continuation_tokens() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("GET"))
        .and(path("/mirror"))
        .and(query_param_is_missing("continuation-token"))
        .respond_with(xml(listing(&["sub/1.txt"], Some("page-2"))))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/mirror"))
        .and(query_param("continuation-token", "page-2"))
        .respond_with(xml(listing(&["sub/2.txt"], None)))
        .expect(1)
        .mount(&server)
        .await;

    let keys: Vec<String> = store
        .list_objects("sub/")
        .await
        .unwrap()
        .iter()
        .map(|k| k.as_str().to_string())
        .collect();

    assert_eq!(keys, vec!["sub/1.txt", "sub/2.txt"]);
}

#[tokio::test]
async fn test_list_objects_empty_prefix_returns_nothing() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("GET"))
        .and(path("/mirror"))
        .respond_with(xml(listing(&[], None)))
        .mount(&server)
        .await;

    assert!(store.list_objects("sub/").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_objects_missing_bucket_is_not_found() {
    let (server, store) = common::setup_s3_mock().await;

    Mock::given(method("GET"))
        .and(path("/mirror"))
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

    let err = store.list_objects("sub/").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)), "got {err:?}");
}
