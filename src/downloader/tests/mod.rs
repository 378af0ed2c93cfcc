use super::test_helpers::*;
use super::*;
use crate::error::SourceError;
use crate::types::{ContentHash, ProcessOutcome, ResourceSkip, ResourceTally, SkipReason};
use std::path::PathBuf;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod filters;

/// Serve `body` at `route`, expecting exactly `hits` requests
async fn serve(server: &MockServer, route: &str, body: &[u8], hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(hits)
        .mount(server)
        .await;
}

/// Fail any request to `route`, expecting exactly `hits` requests
async fn fail(server: &MockServer, route: &str, status: u16, hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .expect(hits)
        .mount(server)
        .await;
}

/// Destination of a single-resource submission under the default formatter
fn destination(config: &Config, id: &str) -> PathBuf {
    config.download_dir.join("pics").join(format!("{}.jpg", id))
}
