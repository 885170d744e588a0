// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Content router tests
//!
//! Exercises the content-addressed payload routes against a filesystem
//! store: full downloads, ranged downloads, HEAD length probes and the
//! 404 paths.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;
use update_sync_catalog::{ApprovalSet, CatalogHolder};
use update_sync_model::FsContentSource;
use update_sync_server::{
    ContentService, MetadataFragmenter, OfferingEngine, ServerState, UnapprovedUpdatesNotifier,
    UpdateServer,
};
use update_sync_test_utils::{sample_digest, CatalogFixture};

const PAYLOAD: &[u8] = b"0123456789abcdef";

/// Store holding one payload at `CD/ab10cd`, catalog carrying its file
fn content_server() -> (tempfile::TempDir, UpdateServer) {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("CD");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("ab10cd"), PAYLOAD).unwrap();

    let mut fixture = CatalogFixture::new();
    fixture.add_software_with_file(sample_digest(&[0xAB, 0x10, 0xCD]), "setup.exe");
    // A file the catalog knows about but the store does not hold.
    fixture.add_software_with_file(sample_digest(&[0x01, 0x02]), "missing.exe");

    let catalog = Arc::new(CatalogHolder::empty());
    let approvals = Arc::new(ApprovalSet::new());
    let fragmenter = Arc::new(MetadataFragmenter::new());
    let unapproved = Arc::new(UnapprovedUpdatesNotifier::new());
    let engine = Arc::new(OfferingEngine::new(
        catalog.clone(),
        approvals.clone(),
        fragmenter.clone(),
        unapproved.clone(),
    ));
    let state = ServerState {
        catalog,
        approvals,
        fragmenter,
        engine,
        unapproved,
        content: Some(Arc::new(ContentService::new(Arc::new(
            FsContentSource::new(dir.path()),
        )))),
        content_http_root: Some("http://srv:32150".to_string()),
        properties: Arc::new(serde_json::Value::Object(Default::default())),
        started_at: Utc::now(),
    };
    state.set_metadata_source(Some(fixture.build()));
    (dir, UpdateServer::from_state(state))
}

async fn request(
    server: &UpdateServer,
    method: Method,
    path: &str,
    range: Option<&str>,
) -> (StatusCode, Vec<(String, String)>, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(range) = range {
        builder = builder.header(header::RANGE, range);
    }
    let response = server
        .router()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

#[tokio::test]
async fn get_streams_the_full_payload() {
    let (_dir, server) = content_server();
    let (status, headers, body) =
        request(&server, Method::GET, "/Content/CD/ab10cd", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, PAYLOAD);
    assert_eq!(
        header_value(&headers, "content-type"),
        Some("application/octet-stream")
    );
    assert_eq!(header_value(&headers, "content-length"), Some("16"));
    assert_eq!(header_value(&headers, "accept-ranges"), Some("bytes"));
    assert_eq!(
        header_value(&headers, "content-disposition"),
        Some("attachment; filename=\"ab10cd\"")
    );
}

#[tokio::test]
async fn content_paths_are_case_insensitive() {
    let (_dir, server) = content_server();
    for path in ["/Content/cd/AB10CD", "/Content/Cd/Ab10Cd", "/Content/CD/ab10cd"] {
        let (status, _, body) = request(&server, Method::GET, path, None).await;
        assert_eq!(status, StatusCode::OK, "path {path}");
        assert_eq!(body, PAYLOAD);
    }
}

#[tokio::test]
async fn ranged_get_returns_partial_content() {
    let (_dir, server) = content_server();
    let (status, headers, body) =
        request(&server, Method::GET, "/Content/CD/ab10cd", Some("bytes=4-7")).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, b"4567");
    assert_eq!(header_value(&headers, "content-length"), Some("4"));
    assert_eq!(
        header_value(&headers, "content-range"),
        Some("bytes 4-7/16")
    );
}

#[tokio::test]
async fn open_ended_range_reads_to_the_end() {
    let (_dir, server) = content_server();
    let (status, _, body) =
        request(&server, Method::GET, "/Content/CD/ab10cd", Some("bytes=12-")).await;

    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, b"cdef");
}

#[tokio::test]
async fn unsatisfiable_range_falls_back_to_full_response() {
    let (_dir, server) = content_server();
    let (status, _, body) =
        request(&server, Method::GET, "/Content/CD/ab10cd", Some("bytes=99-120")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, PAYLOAD);
}

#[tokio::test]
async fn head_reports_length_without_a_body() {
    let (_dir, server) = content_server();
    let (status, headers, body) =
        request(&server, Method::HEAD, "/Content/CD/ab10cd", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(header_value(&headers, "content-length"), Some("16"));
}

#[tokio::test]
async fn unknown_key_is_not_found() {
    let (_dir, server) = content_server();
    let (status, _, _) = request(&server, Method::GET, "/Content/FF/ffff", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = request(&server, Method::HEAD, "/Content/FF/ffff", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn indexed_but_unstored_file_is_not_found() {
    let (_dir, server) = content_server();
    let (status, _, _) = request(&server, Method::GET, "/Content/2/0102", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn catalog_swap_rebuilds_the_index() {
    let (_dir, server) = content_server();

    // Swapping to an empty catalog drops every content key.
    let empty = CatalogFixture::new();
    server.set_metadata_source(Some(empty.build()));
    let (status, _, _) = request(&server, Method::GET, "/Content/CD/ab10cd", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
