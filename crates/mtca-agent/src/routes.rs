// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Route definitions for the MTConnect query surface.

use crate::handlers;
use crate::AppState;
use axum::{routing::get, Router};
use std::sync::Arc;

/// MTConnect REST routes.
///
/// A path segment that is not one of the fixed endpoints is a device filter
/// (uuid or name, `a;b` for several), so the fixed routes must be registered
/// before the `/:device` fallbacks.
pub fn agent_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::probe_all))
        .route("/probe", get(handlers::probe_all))
        .route("/current", get(handlers::current_all))
        .route("/sample", get(handlers::sample_all))
        .route("/assets", get(handlers::assets_all))
        .route("/asset", get(handlers::assets_all))
        .route("/assets/:ids", get(handlers::assets_by_id))
        .route("/asset/:ids", get(handlers::assets_by_id))
        .route("/:device", get(handlers::probe_device))
        .route("/:device/probe", get(handlers::probe_device))
        .route("/:device/current", get(handlers::current_device))
        .route("/:device/sample", get(handlers::sample_device))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::StreamParams;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use mtca::agent::{Agent, AgentSettings};
    use mtca::schema::{Category, DataItem, DeviceSchema};
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let mut agent = Agent::new(AgentSettings {
            buffer_size: 32,
            instance_id: Some(7),
            ..Default::default()
        });
        agent
            .register_device(DeviceSchema {
                id: "dev".to_string(),
                uuid: "000".to_string(),
                name: "VMC-3Axis".to_string(),
                data_items: vec![DataItem {
                    id: "dtop_1".to_string(),
                    name: Some("avail".to_string()),
                    item_type: "AVAILABILITY".to_string(),
                    sub_type: None,
                    category: Category::Event,
                    units: None,
                    native_units: None,
                }],
                components: vec![],
            })
            .expect("register");
        Arc::new(AppState {
            agent: Arc::new(agent),
        })
    }

    async fn fetch(path: &str) -> (StatusCode, Option<String>, String) {
        let app = agent_routes().with_state(test_state());
        let response = app
            .oneshot(Request::get(path).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let digest = response
            .headers()
            .get("content-md5")
            .map(|v| v.to_str().expect("ascii").to_string());
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .expect("body");
        (status, digest, String::from_utf8(bytes.to_vec()).expect("utf8"))
    }

    #[tokio::test]
    async fn test_probe_route() {
        let (status, digest, body) = fetch("/probe").await;
        assert_eq!(status, StatusCode::OK);
        assert!(digest.is_some());
        assert!(body.contains("<MTConnectDevices"));
        assert!(body.contains("uuid=\"000\""));
    }

    #[tokio::test]
    async fn test_device_scoped_current() {
        let (status, _, body) = fetch("/VMC-3Axis/current").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<MTConnectStreams"));
        assert!(body.contains("Availability"));
    }

    #[tokio::test]
    async fn test_unknown_device_is_error_document_with_200() {
        let (status, _, body) = fetch("/mill-7/current").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<MTConnectError"));
        assert!(body.contains("NO_DEVICE"));
    }

    #[tokio::test]
    async fn test_at_with_interval_is_invalid_request() {
        let (status, _, body) = fetch("/current?at=1&interval=100").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("INVALID_REQUEST"));
    }

    #[tokio::test]
    async fn test_sample_count_zero_message() {
        let (_, _, body) = fetch("/sample?count=0").await;
        assert!(body.contains("OUT_OF_RANGE"));
        assert!(body.contains("must be greater than or equal to 1"));
    }

    #[tokio::test]
    async fn test_asset_not_found() {
        let (status, _, body) = fetch("/asset/GHOST").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("ASSET_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_content_md5_matches_body() {
        let (_, digest, body) = fetch("/probe").await;
        let digest = digest.expect("digest header");
        let recomputed = {
            use md5::{Digest, Md5};
            let hash = Md5::digest(body.as_bytes());
            hash.iter().map(|b| format!("{b:02x}")).collect::<String>()
        };
        assert_eq!(digest, recomputed);
    }

    #[test]
    fn test_stream_params_default() {
        let params = StreamParams::default();
        assert!(params.at.is_none());
        assert!(params.interval.is_none());
    }
}
