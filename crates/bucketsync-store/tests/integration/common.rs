//! Shared helpers for S3 store integration tests
//!
//! The store is configured with path-style addressing, so every request
//! lands on `/{bucket}` or `/{bucket}/{key}` of the mock server.

use bucketsync_core::config::ConfigBuilder;
use bucketsync_core::domain::ObjectKey;
use bucketsync_core::ports::ObjectBody;
use bucketsync_store::S3RemoteStore;
use wiremock::MockServer;

pub const BUCKET: &str = "mirror";

/// Starts a mock server and returns a store pointing at it.
///
/// The multipart threshold and part size are both 5 MiB.
pub async fn setup_s3_mock() -> (MockServer, S3RemoteStore) {
    let server = MockServer::start().await;

    let endpoint = server
        .uri()
        .trim_start_matches("http://")
        .to_string();

    let config = ConfigBuilder::new()
        .remote_endpoint(endpoint)
        .remote_credentials("test-access-key", "test-secret-key")
        .remote_bucket(BUCKET)
        .transfer_multipart_threshold_mb(5)
        .transfer_part_size_mb(5)
        .build();

    let store = S3RemoteStore::new(&config).expect("store construction failed");
    (server, store)
}

pub fn key(s: &str) -> ObjectKey {
    ObjectKey::new(s).unwrap()
}

/// Wraps bytes as an upload body
pub fn body(data: Vec<u8>) -> ObjectBody {
    Box::new(std::io::Cursor::new(data))
}

/// S3-style XML error body
pub fn error_body(code: &str, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>{code}</Code><Message>{message}</Message><RequestId>req-1</RequestId></Error>"#
    )
}
