// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Content router
//!
//! Serves update payloads under `/Content/{directory}/{name}`, the same
//! content-addressed scheme the file locations in extended-info replies
//! advertise. The `(directory, name) → file` map is rebuilt on every
//! catalog swap and compared case-insensitively on both path segments.
//!
//! The content store is independent of the catalog; these handlers never
//! pin a catalog snapshot.

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, error};
use update_sync_model::{ContentSource, Update, UpdateFile};

use crate::server::ServerState;

/// Lookup table from content-addressed path pairs to update files
#[derive(Default)]
pub struct ContentIndex {
    files: HashMap<String, UpdateFile>,
}

impl ContentIndex {
    /// Build the index over every file of the given updates
    ///
    /// Files are deduplicated by first-digest base64, keeping the first
    /// occurrence. Keys are the lowercased `"{directory}/{name}"` pair.
    pub fn build(updates: &[Arc<Update>]) -> Self {
        let mut files = HashMap::new();
        let mut seen_digests = HashSet::new();
        for update in updates {
            for file in update.files() {
                let Some(digest) = file.primary_digest() else {
                    continue;
                };
                if !seen_digests.insert(digest.base64()) {
                    continue;
                }
                let Some((directory, name)) = digest.content_path() else {
                    continue;
                };
                let key = format!("{directory}/{name}").to_lowercase();
                files.insert(key, file.clone());
            }
        }
        debug!(files = files.len(), "content index built");
        Self { files }
    }

    /// Case-insensitive lookup by path segments
    pub fn lookup(&self, directory: &str, name: &str) -> Option<&UpdateFile> {
        let key = format!("{directory}/{name}").to_lowercase();
        self.files.get(&key)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// The content store plus its live index
pub struct ContentService {
    index: ArcSwap<ContentIndex>,
    source: Arc<dyn ContentSource>,
}

impl ContentService {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self {
            index: ArcSwap::from_pointee(ContentIndex::default()),
            source,
        }
    }

    /// Replace the index after a catalog swap
    pub fn reindex(&self, updates: &[Arc<Update>]) {
        self.index.store(Arc::new(ContentIndex::build(updates)));
    }

    fn lookup(&self, directory: &str, name: &str) -> Option<UpdateFile> {
        self.index.load().lookup(directory, name).cloned()
    }
}

/// `GET /Content/{directory}/{name}`
pub async fn get_content(
    State(state): State<ServerState>,
    Path((directory, name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let Some(content) = state.content.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(file) = content.lookup(&directory, &name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !content.source.contains(&file).await {
        return StatusCode::NOT_FOUND.into_response();
    }

    let total = match content.source.len(&file).await {
        Ok(total) => total,
        Err(e) => {
            error!(file = %file.file_name, "failed to stat payload: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_range(value, total));

    let stream = match content.source.open(&file, range).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(file = %file.file_name, "failed to open payload: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, stream.len)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{name}\""),
        );
    if let Some((start, _)) = range {
        let end = start + stream.len - 1;
        builder = builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(
                header::CONTENT_RANGE,
                format!("bytes {start}-{end}/{}", stream.total_len),
            );
    }

    match builder.body(Body::from_stream(ReaderStream::new(stream.reader))) {
        Ok(response) => response,
        Err(e) => {
            error!("failed to build content response: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `HEAD /Content/{directory}/{name}`
///
/// Answers with the payload length only; no stream is opened.
pub async fn head_content(
    State(state): State<ServerState>,
    Path((directory, name)): Path<(String, String)>,
) -> Response {
    let Some(content) = state.content.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(file) = content.lookup(&directory, &name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !content.source.contains(&file).await {
        return StatusCode::NOT_FOUND.into_response();
    }

    match content.source.len(&file).await {
        Ok(total) => {
            let response = Response::builder()
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .header(header::CONTENT_LENGTH, total)
                .header(header::ACCEPT_RANGES, "bytes")
                .body(Body::empty());
            match response {
                Ok(response) => response,
                Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            }
        }
        Err(e) => {
            error!(file = %file.file_name, "failed to stat payload: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Parse a single-range `Range` header into inclusive offsets
///
/// Multi-range requests and unsatisfiable specs are ignored, falling back
/// to a full 200 response.
fn parse_range(header: &str, total: u64) -> Option<(u64, u64)> {
    if total == 0 {
        return None;
    }
    let spec = header.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    match (start.is_empty(), end.is_empty()) {
        (true, true) => None,
        // Suffix form: the final N bytes.
        (true, false) => {
            let suffix: u64 = end.trim().parse().ok()?;
            if suffix == 0 {
                return None;
            }
            Some((total.saturating_sub(suffix), total - 1))
        }
        (false, true) => {
            let start: u64 = start.trim().parse().ok()?;
            if start >= total {
                return None;
            }
            Some((start, total - 1))
        }
        (false, false) => {
            let start: u64 = start.trim().parse().ok()?;
            let end: u64 = end.trim().parse().ok()?;
            if start > end || start >= total {
                return None;
            }
            Some((start, end))
        }
    }
}
