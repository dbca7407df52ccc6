//! Integration tests for bucketsync-store
//!
//! Uses wiremock to simulate an S3-compatible service and verifies the
//! requests `S3RemoteStore` sends and how it maps the responses.

mod common;

mod test_bucket;
mod test_list;
mod test_objects;
mod test_multipart;
