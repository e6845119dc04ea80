//! HTTP control and query surface.
//!
//! - `GET /devices?last=N`: live devices, strongest signal first
//! - `GET /beacons?last=N`: live beacons, first-seen order
//! - `POST /start`, `POST /stop`: scan control (GET kept for plain links)
//! - `GET /status`: scan state and registry size
//! - `GET /` and `/public/*`: the static dashboard

pub mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult, ErrorResponse};

use crate::controller::ScanController;
use crate::registry::Registry;
use axum::{
    Router,
    routing::{get, post},
};
use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub controller: ScanController,
}

impl AppState {
    pub fn new(controller: ScanController) -> Self {
        Self {
            registry: controller.registry().clone(),
            controller,
        }
    }
}

/// Build the router. `public_dir` holds `index.html` and its assets.
pub fn create_router(state: AppState, public_dir: &Path) -> Router {
    Router::new()
        .route("/devices", get(handlers::list_devices))
        .route("/beacons", get(handlers::list_beacons))
        .route(
            "/start",
            post(handlers::start_scan).get(handlers::start_scan),
        )
        .route("/stop", post(handlers::stop_scan).get(handlers::stop_scan))
        .route("/status", get(handlers::status))
        .route_service("/", ServeFile::new(public_dir.join("index.html")))
        .nest_service("/public", ServeDir::new(public_dir))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertisement::Advertisement;
    use crate::controller::{ScanConfig, dispatch};
    use crate::mac_address::MacAddress;
    use crate::test_utils::{IdleRadio, TEST_MAC, beacon_advertisement};
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let (controller, _failures) = ScanController::new(
            Arc::new(IdleRadio::default()),
            Registry::new(),
            ScanConfig {
                base_station: "test".into(),
                ..Default::default()
            },
        );
        AppState::new(controller)
    }

    fn router(state: &AppState) -> Router {
        create_router(state.clone(), Path::new("/nonexistent"))
    }

    async fn send(router: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_devices_empty_registry() {
        let state = test_state();
        let (status, body) = send(router(&state), Method::GET, "/devices").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Array(vec![]));
    }

    #[tokio::test]
    async fn test_devices_sorted_by_rssi() {
        let state = test_state();
        let weak = Advertisement {
            address: MacAddress([1, 2, 3, 4, 5, 6]),
            rssi: -90,
            ..Default::default()
        };
        dispatch(&state.registry, &weak, "test").unwrap();
        dispatch(&state.registry, &beacon_advertisement(TEST_MAC, -40), "test").unwrap();

        let (status, body) = send(router(&state), Method::GET, "/devices?last=30").await;
        assert_eq!(status, StatusCode::OK);
        let devices = body.as_array().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0]["mac"], "AA:BB:CC:DD:EE:FF");
        assert_eq!(devices[0]["rssi"], -40);
        assert_eq!(devices[1]["mac"], "01:02:03:04:05:06");
    }

    #[tokio::test]
    async fn test_beacons_only_lists_beacons() {
        let state = test_state();
        let plain = Advertisement {
            address: MacAddress([1, 2, 3, 4, 5, 6]),
            rssi: -30,
            ..Default::default()
        };
        dispatch(&state.registry, &plain, "test").unwrap();
        dispatch(&state.registry, &beacon_advertisement(TEST_MAC, -70), "test").unwrap();

        let (status, body) = send(router(&state), Method::GET, "/beacons?last=").await;
        assert_eq!(status, StatusCode::OK);
        let beacons = body.as_array().unwrap();
        assert_eq!(beacons.len(), 1);
        assert_eq!(beacons[0]["mac"], "AA:BB:CC:DD:EE:FF");
        assert_eq!(beacons[0]["uuid"], "00112233445566778899aabbccddeeff");
        assert_eq!(beacons[0]["major"], "0102");
        assert_eq!(beacons[0]["minor"], "0304");
        assert_eq!(beacons[0]["battery"], "5a");
        assert_eq!(beacons[0]["service_uuid"], "0318");
        assert_eq!(beacons[0]["base_station"], "test");
    }

    #[tokio::test]
    async fn test_invalid_window_is_bad_request() {
        let state = test_state();
        for uri in ["/devices?last=abc", "/beacons?last=-5"] {
            let (status, body) = send(router(&state), Method::GET, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["code"], "INVALID_QUERY_PARAMETER");
        }
    }

    #[tokio::test]
    async fn test_start_stop_transitions() {
        let state = test_state();

        let (status, body) = send(router(&state), Method::POST, "/start").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "scanning");

        let (status, body) = send(router(&state), Method::POST, "/start").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_SCANNING");
        assert_eq!(body["message"], "Already scanning.");

        let (status, body) = send(router(&state), Method::GET, "/stop").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "stopped");

        let (status, body) = send(router(&state), Method::POST, "/stop").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_STOPPED");
    }

    #[tokio::test]
    async fn test_status_reports_registry_size() {
        let state = test_state();
        dispatch(&state.registry, &beacon_advertisement(TEST_MAC, -50), "test").unwrap();

        let (status, body) = send(router(&state), Method::GET, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "stopped");
        assert_eq!(body["devices"], 1);
    }

    #[tokio::test]
    async fn test_serves_dashboard() {
        let dir: PathBuf =
            std::env::temp_dir().join(format!("blueblue-http-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>beacons</h1>").unwrap();
        std::fs::write(dir.join("app.js"), "refresh();").unwrap();

        let app = create_router(test_state(), &dir);
        for (uri, expected) in [("/", "<h1>beacons</h1>"), ("/public/app.js", "refresh();")] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(&bytes[..], expected.as_bytes());
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
