// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP request handlers for the MTConnect query surface.
//!
//! Every response is HTTP 200 with a `text/xml` body - including failures,
//! which carry an MTConnectError document (MTConnect convention). Interval
//! queries switch to `multipart/x-mixed-replace` streaming.

use crate::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use md5::{Digest, Md5};
use mtca::agent::{Agent, CurrentQuery, SampleQuery};
use mtca::error::QueryError;
use mtca::xml::XmlElement;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Largest accepted `interval` in milliseconds (2^31 - 2).
const MAX_INTERVAL_MS: u64 = 2_147_483_646;

/// Query parameters shared by `current` and `sample`.
#[derive(Debug, Default, Deserialize)]
pub struct StreamParams {
    pub at: Option<String>,
    pub from: Option<String>,
    pub count: Option<String>,
    pub path: Option<String>,
    pub interval: Option<String>,
}

/// Query parameters for asset listing.
#[derive(Debug, Default, Deserialize)]
pub struct AssetParams {
    #[serde(rename = "type")]
    pub asset_type: Option<String>,
    pub count: Option<String>,
}

// ------------------------------------------------------------------
// probe
// ------------------------------------------------------------------

/// GET / and GET /probe
pub async fn probe_all(State(state): State<Arc<AppState>>) -> Response {
    respond(&state.agent, state.agent.probe(None))
}

/// GET /{device} and GET /{device}/probe
pub async fn probe_device(
    State(state): State<Arc<AppState>>,
    Path(device): Path<String>,
) -> Response {
    respond(&state.agent, state.agent.probe(Some(&device)))
}

// ------------------------------------------------------------------
// current
// ------------------------------------------------------------------

/// GET /current
pub async fn current_all(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamParams>,
) -> Response {
    current_impl(state, None, params)
}

/// GET /{device}/current
pub async fn current_device(
    State(state): State<Arc<AppState>>,
    Path(device): Path<String>,
    Query(params): Query<StreamParams>,
) -> Response {
    current_impl(state, Some(device), params)
}

fn current_impl(state: Arc<AppState>, device: Option<String>, params: StreamParams) -> Response {
    let mut errors = Vec::new();
    let at = parse_sequence(params.at.as_deref(), "at", &mut errors);
    let interval = parse_interval(params.interval.as_deref(), &mut errors);
    if params.at.is_some() && params.interval.is_some() {
        errors.push(QueryError::InvalidRequest(
            "cannot use 'at' together with 'interval'".to_string(),
        ));
    }
    if !errors.is_empty() {
        return error_response(&state.agent, &errors);
    }

    let query = CurrentQuery {
        device,
        at,
        path: params.path,
    };
    match interval {
        Some(interval) => stream_current(state, query, interval),
        None => respond(&state.agent, state.agent.current(query)),
    }
}

// ------------------------------------------------------------------
// sample
// ------------------------------------------------------------------

/// GET /sample
pub async fn sample_all(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StreamParams>,
) -> Response {
    sample_impl(state, None, params)
}

/// GET /{device}/sample
pub async fn sample_device(
    State(state): State<Arc<AppState>>,
    Path(device): Path<String>,
    Query(params): Query<StreamParams>,
) -> Response {
    sample_impl(state, Some(device), params)
}

fn sample_impl(state: Arc<AppState>, device: Option<String>, params: StreamParams) -> Response {
    let mut errors = Vec::new();
    if params.at.is_some() {
        errors.push(QueryError::InvalidRequest(
            "'at' is not valid for sample requests".to_string(),
        ));
    }
    let from = parse_sequence(params.from.as_deref(), "from", &mut errors);
    let count = parse_count(params.count.as_deref(), &mut errors);
    let interval = parse_interval(params.interval.as_deref(), &mut errors);
    if !errors.is_empty() {
        return error_response(&state.agent, &errors);
    }

    let query = SampleQuery {
        device,
        from,
        count,
        path: params.path,
    };
    match interval {
        Some(interval) => stream_sample(state, query, interval),
        None => respond(&state.agent, state.agent.sample(query)),
    }
}

// ------------------------------------------------------------------
// asset
// ------------------------------------------------------------------

/// GET /assets
pub async fn assets_all(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AssetParams>,
) -> Response {
    let mut errors = Vec::new();
    let count = parse_count(params.count.as_deref(), &mut errors);
    if !errors.is_empty() {
        return error_response(&state.agent, &errors);
    }
    respond(
        &state.agent,
        state
            .agent
            .assets_document(None, params.asset_type.as_deref(), count),
    )
}

/// GET /asset/{ids} - `;`-separated asset ids.
pub async fn assets_by_id(
    State(state): State<Arc<AppState>>,
    Path(ids): Path<String>,
) -> Response {
    let ids: Vec<String> = ids
        .split(';')
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    respond(&state.agent, state.agent.assets_document(Some(&ids), None, None))
}

// ------------------------------------------------------------------
// parameter parsing
// ------------------------------------------------------------------

fn parse_sequence(raw: Option<&str>, name: &str, errors: &mut Vec<QueryError>) -> Option<u64> {
    let raw = raw?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(QueryError::OutOfRange(format!(
                "'{name}' must be a non-negative integer, was \"{raw}\""
            )));
            None
        }
    }
}

fn parse_count(raw: Option<&str>, errors: &mut Vec<QueryError>) -> Option<usize> {
    let raw = raw?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(QueryError::OutOfRange(format!(
                "'count' must be a non-negative integer, was \"{raw}\""
            )));
            None
        }
    }
}

fn parse_interval(raw: Option<&str>, errors: &mut Vec<QueryError>) -> Option<u64> {
    let raw = raw?;
    match raw.parse::<u64>() {
        Ok(value) if value <= MAX_INTERVAL_MS => Some(value),
        Ok(value) => {
            errors.push(QueryError::OutOfRange(format!(
                "'interval' must be between 0 and {MAX_INTERVAL_MS}, was {value}"
            )));
            None
        }
        Err(_) => {
            errors.push(QueryError::OutOfRange(format!(
                "'interval' must be a non-negative integer, was \"{raw}\""
            )));
            None
        }
    }
}

// ------------------------------------------------------------------
// responses
// ------------------------------------------------------------------

fn respond(agent: &Agent, result: Result<XmlElement, Vec<QueryError>>) -> Response {
    match result {
        Ok(document) => xml_response(&document),
        Err(errors) => error_response(agent, &errors),
    }
}

fn error_response(agent: &Agent, errors: &[QueryError]) -> Response {
    xml_response(&agent.error_document(errors))
}

/// Serialize a document tree as `text/xml` with a `Content-MD5` digest.
fn xml_response(document: &XmlElement) -> Response {
    match document.to_document_string() {
        Ok(body) => (
            StatusCode::OK,
            [
                ("content-type", "text/xml".to_string()),
                ("content-md5", md5_hex(body.as_bytes())),
            ],
            body,
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("document serialization failed: {err}"),
        )
            .into_response(),
    }
}

fn md5_hex(bytes: &[u8]) -> String {
    let digest = Md5::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

// ------------------------------------------------------------------
// interval streaming
// ------------------------------------------------------------------

/// One multipart frame: boundary, part headers, document, trailing CRLF.
fn multipart_frame(boundary: &str, body: &str) -> Bytes {
    Bytes::from(format!(
        "--{boundary}\r\nContent-type: text/xml\r\nContent-length: {}\r\n\r\n{body}\r\n",
        body.len()
    ))
}

fn closing_frame(boundary: &str) -> Bytes {
    Bytes::from(format!("--{boundary}--\r\n"))
}

fn boundary_for(agent: &Agent) -> String {
    md5_hex(
        format!(
            "{}:{}",
            agent.instance_id(),
            agent.store().next_sequence()
        )
        .as_bytes(),
    )
}

fn multipart_response(boundary: &str, body: Body) -> Response {
    (
        StatusCode::OK,
        [(
            "content-type",
            format!("multipart/x-mixed-replace; boundary={boundary}"),
        )],
        body,
    )
        .into_response()
}

/// `sample` with `interval`: emit successive windows, each resuming at the
/// previous part's `nextSequence`. A terminal error (e.g. the client fell out
/// of the buffer window) emits the error document and the closing boundary.
/// Client disconnect drops the stream and cancels the generator.
fn stream_sample(state: Arc<AppState>, query: SampleQuery, interval_ms: u64) -> Response {
    let boundary = boundary_for(&state.agent);
    let frame_boundary = boundary.clone();

    let stream = async_stream::stream! {
        let agent = &state.agent;
        let mut from = query.from.unwrap_or_else(|| agent.store().next_sequence());
        loop {
            let window = SampleQuery {
                device: query.device.clone(),
                from: Some(from),
                count: query.count,
                path: query.path.clone(),
            };
            match agent.sample_with_next(window) {
                Ok((document, next)) => {
                    let Ok(body) = document.to_document_string() else {
                        yield Ok(closing_frame(&frame_boundary));
                        break;
                    };
                    yield Ok::<Bytes, std::io::Error>(multipart_frame(&frame_boundary, &body));
                    from = next;
                }
                Err(errors) => {
                    if let Ok(body) = agent.error_document(&errors).to_document_string() {
                        yield Ok(multipart_frame(&frame_boundary, &body));
                    }
                    yield Ok(closing_frame(&frame_boundary));
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    };

    multipart_response(&boundary, Body::from_stream(stream))
}

/// `current` with `interval`: emit a fresh snapshot per part.
fn stream_current(state: Arc<AppState>, query: CurrentQuery, interval_ms: u64) -> Response {
    let boundary = boundary_for(&state.agent);
    let frame_boundary = boundary.clone();

    let stream = async_stream::stream! {
        let agent = &state.agent;
        loop {
            match agent.current(query.clone()) {
                Ok(document) => {
                    let Ok(body) = document.to_document_string() else {
                        yield Ok(closing_frame(&frame_boundary));
                        break;
                    };
                    yield Ok::<Bytes, std::io::Error>(multipart_frame(&frame_boundary, &body));
                }
                Err(errors) => {
                    if let Ok(body) = agent.error_document(&errors).to_document_string() {
                        yield Ok(multipart_frame(&frame_boundary, &body));
                    }
                    yield Ok(closing_frame(&frame_boundary));
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    };

    multipart_response(&boundary, Body::from_stream(stream))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sequence() {
        let mut errors = Vec::new();
        assert_eq!(parse_sequence(Some("42"), "from", &mut errors), Some(42));
        assert_eq!(parse_sequence(None, "from", &mut errors), None);
        assert!(errors.is_empty());

        assert_eq!(parse_sequence(Some("-1"), "from", &mut errors), None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "OUT_OF_RANGE");
        assert!(errors[0].to_string().contains("'from'"));
    }

    #[test]
    fn test_parse_interval_bounds() {
        let mut errors = Vec::new();
        assert_eq!(parse_interval(Some("0"), &mut errors), Some(0));
        assert_eq!(
            parse_interval(Some("2147483646"), &mut errors),
            Some(MAX_INTERVAL_MS)
        );
        assert!(errors.is_empty());

        assert_eq!(parse_interval(Some("2147483647"), &mut errors), None);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "OUT_OF_RANGE");
    }

    #[test]
    fn test_md5_hex_digest() {
        // RFC 1321 test vector.
        assert_eq!(md5_hex(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_multipart_frame_layout() {
        let frame = multipart_frame("mtcb", "<xml/>");
        let text = String::from_utf8(frame.to_vec()).expect("utf8");
        assert!(text.starts_with("--mtcb\r\n"));
        assert!(text.contains("Content-type: text/xml\r\n"));
        assert!(text.contains("Content-length: 6\r\n"));
        assert!(text.ends_with("<xml/>\r\n"));

        let closing = closing_frame("mtcb");
        assert_eq!(&closing[..], b"--mtcb--\r\n");
    }
}
