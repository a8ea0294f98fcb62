//! In-process HTTP driver: the real router over `TestDependencies` mocks.

#![allow(dead_code)]

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mojifeed_core::kernel::{ServerDeps, TestDependencies};
use mojifeed_core::server::{build_app, AppOptions, AppState};
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
}

impl TestApp {
    /// Router over the given mocks (which stay inspectable by the caller)
    pub fn new(deps: &TestDependencies) -> Self {
        Self::with_deps(deps.server_deps(), None)
    }

    pub fn with_deps(deps: ServerDeps, blob_dir: Option<PathBuf>) -> Self {
        let router = build_app(
            AppState::new(deps, None),
            AppOptions {
                allowed_origins: Vec::new(),
                blob_dir,
            },
        );
        Self { router }
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        self.post_raw(path, body.to_string()).await
    }

    pub async fn post_raw(&self, path: &str, body: impl Into<Body>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap();
        self.request(request).await
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        self.request(request).await
    }
}
