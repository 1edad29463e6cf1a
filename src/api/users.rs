//! Profile endpoint

use crate::api::run_blocking;
use crate::auth::models::{Session, UserResponse};
use crate::videos::{api::VideoApiError, models::Video, VideoState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: UserResponse,
    pub videos: Vec<Video>,
}

/// GET /api/users/me - caller's account plus their uploads
pub async fn get_me(
    State(state): State<VideoState>,
    Extension(session): Extension<Session>,
) -> Result<Json<ProfileResponse>, Response> {
    let Ok(user_id) = Uuid::parse_str(&session.subject_id) else {
        return Err(user_not_found());
    };

    let users = state.user_store.clone();
    let videos = state.videos.clone();
    let profile = run_blocking(move || {
        let Some(user) = users.get_user(&user_id)? else {
            return Ok(None);
        };
        let videos = videos.list_by_uploader(&session.subject_id)?;
        Ok(Some((user, videos)))
    })
    .await
    .map_err(|e| VideoApiError::internal(e).into_response())?;

    let (user, videos) = profile.ok_or_else(user_not_found)?;

    Ok(Json(ProfileResponse {
        user: UserResponse::from_user(&user),
        videos,
    }))
}

fn user_not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "msg": "User not found" }))).into_response()
}
