//! HTTP surface: route table and the state each route group needs.

pub mod users;

use crate::auth::{api as auth_api, auth_middleware, AuthState, SessionGate};
use crate::middleware::{rate_limit_middleware, request_logging, RateLimitLayer};
use crate::videos::{api as videos_api, VideoState};
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Multipart framing overhead allowed on top of the file itself.
const UPLOAD_BODY_SLACK: usize = 1024 * 1024;

/// Everything the router needs, built once at startup.
#[derive(Clone)]
pub struct AppContext {
    pub auth: AuthState,
    pub videos: VideoState,
    pub gate: Arc<SessionGate>,
    pub rate_limiter: RateLimitLayer,
}

/// Assemble the full application router.
pub fn build_router(ctx: AppContext) -> Router {
    // Credential endpoints: public, rate limited per IP
    let auth_router = Router::new()
        .route("/api/auth/register", post(auth_api::register))
        .route("/api/auth/login", post(auth_api::login))
        .route_layer(middleware::from_fn_with_state(
            ctx.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .with_state(ctx.auth.clone());

    // Session endpoints: behind the token gate
    let session_routes = Router::new()
        .route("/api/auth/logout", post(auth_api::logout))
        .route("/api/protected", get(auth_api::protected))
        .route_layer(middleware::from_fn_with_state(
            ctx.gate.clone(),
            auth_middleware,
        ))
        .with_state(ctx.auth);

    // Video library + profile: behind the token gate
    let upload_body_limit = ctx.videos.max_upload_bytes + UPLOAD_BODY_SLACK;
    let video_routes = Router::new()
        .route(
            "/api/memes/upload",
            post(videos_api::upload)
                .layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route("/api/memes/search", get(videos_api::search))
        .route("/api/memes/download/:id", get(videos_api::download))
        .route("/api/memes/:id/like", post(videos_api::toggle_like))
        .route("/api/memes/:id/comment", post(videos_api::add_comment))
        .route("/api/users/me", get(users::get_me))
        .route_layer(middleware::from_fn_with_state(ctx.gate, auth_middleware))
        .with_state(ctx.videos);

    let public_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(public_routes)
        .merge(auth_router)
        .merge(session_routes)
        .merge(video_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health_check() -> &'static str {
    "🎬 memevault operational"
}

/// Run synchronous work (SQLite, bcrypt) on the blocking pool so it never
/// stalls the async workers.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .context("Blocking task failed")?
}
