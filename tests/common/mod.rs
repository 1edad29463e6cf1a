//! Shared harness for router-level tests.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    extract::connect_info::MockConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use memevault::{
    auth::{AuthState, Clock, JwtHandler, ManualClock, MemoryRevocationStore, SessionGate, UserStore},
    build_router,
    middleware::{RateLimitConfig, RateLimitLayer},
    videos::{models::MAX_UPLOAD_BYTES, VideoState, VideoStore},
    AppContext,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};
use tower::ServiceExt;

pub const T0: i64 = 1_700_000_000;
pub const TTL: i64 = 3600;
const SECRET: &[u8] = b"integration-test-secret-0123456789";

pub struct TestApp {
    pub router: Router,
    pub clock: ManualClock,
    pub revocations: Arc<MemoryRevocationStore>,
    pub upload_dir: TempDir,
    _db: NamedTempFile,
}

pub fn test_app() -> TestApp {
    test_app_with_rate_limit(1_000)
}

pub fn test_app_with_rate_limit(per_minute: u32) -> TestApp {
    build_app(per_minute, MAX_UPLOAD_BYTES)
}

pub fn test_app_with_upload_limit(max_upload_bytes: usize) -> TestApp {
    build_app(1_000, max_upload_bytes)
}

fn build_app(per_minute: u32, max_upload_bytes: usize) -> TestApp {
    let db = NamedTempFile::new().unwrap();
    let db_path = db.path().to_str().unwrap().to_string();
    let upload_dir = TempDir::new().unwrap();

    let clock = ManualClock::new(T0);
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());

    let user_store = Arc::new(UserStore::new(&db_path, 4).unwrap());
    let video_store = Arc::new(VideoStore::new(&db_path).unwrap());
    let revocations = Arc::new(MemoryRevocationStore::new(shared.clone()));
    let jwt = Arc::new(JwtHandler::new(SECRET, TTL, shared));
    let gate = Arc::new(SessionGate::new(jwt, revocations.clone()));

    let ctx = AppContext {
        auth: AuthState::new(user_store.clone(), gate.clone()),
        videos: VideoState::new(video_store, user_store, upload_dir.path().to_path_buf())
            .with_max_upload_bytes(max_upload_bytes),
        gate,
        rate_limiter: RateLimitLayer::new(RateLimitConfig::per_minute(per_minute)),
    };

    let router = build_router(ctx).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));

    TestApp {
        router,
        clock,
        revocations,
        upload_dir,
        _db: db,
    }
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = self.send_raw(req).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn send_raw(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    pub async fn register(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/api/auth/register",
                None,
                &serde_json::json!({ "email": email, "password": password }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(json_request(
            "POST",
            "/api/auth/login",
            None,
            &serde_json::json!({ "email": email, "password": password }),
        ))
        .await
    }
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn bare_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub const BOUNDARY: &str = "memevault-test-boundary";

/// One multipart part: (field name, optional (filename, content type), payload)
pub type Part<'a> = (&'a str, Option<(&'a str, &'a str)>, &'a [u8]);

pub fn multipart_request(uri: &str, token: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    for (name, file, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file {
            Some((filename, content_type)) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap()
}
