//! Shared helpers for driving the API in-process.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use seat_reservation::config::{AppConfig, BookingConfig, Config, LogFormat};
use seat_reservation::store::MemorySeatStore;
use seat_reservation::{router, AppState};

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub error_kind: Option<String>,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("response body is not JSON")
    }
}

pub fn test_config(booking: BookingConfig) -> Config {
    Config {
        app: AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            rust_log: "seat_reservation=debug".to_string(),
            log_format: LogFormat::Text,
            request_timeout_ms: 5_000,
            auto_initialize: false,
        },
        database: None,
        booking,
    }
}

impl TestApp {
    /// An API over its own empty in-memory pool.
    pub fn new() -> Self {
        Self::with_booking(BookingConfig::default())
    }

    pub fn with_booking(booking: BookingConfig) -> Self {
        let state = AppState::with_store(test_config(booking), Arc::new(MemorySeatStore::new()));
        Self { router: router(state.clone()), state }
    }

    pub async fn initialized() -> Self {
        let app = Self::new();
        assert_eq!(app.get("/initializeSeats").await.status, StatusCode::OK);
        app
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, uri: &str) -> TestResponse {
        self.send(Request::post(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: String) -> TestResponse {
        let request = Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn book(&self, count: i64) -> TestResponse {
        self.post_json("/bookSeats", serde_json::json!({ "seatCount": count }))
            .await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let error_kind = response
            .headers()
            .get("x-error-kind")
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            error_kind,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }
}
