//! Video Library API Endpoints
//! Mission: Upload, find, download, like and comment on clips

use crate::api::run_blocking;
use crate::auth::{models::MessageResponse, models::Session, user_store::UserStore};
use crate::videos::{
    models::{
        parse_tags, CommentRequest, NewVideo, SearchQuery, Uploader, Video,
        ACCEPTED_CONTENT_TYPE, MAX_UPLOAD_BYTES,
    },
    store::VideoStore,
};
use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Shared video state
#[derive(Clone)]
pub struct VideoState {
    pub videos: Arc<VideoStore>,
    pub user_store: Arc<UserStore>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl VideoState {
    pub fn new(videos: Arc<VideoStore>, user_store: Arc<UserStore>, upload_dir: PathBuf) -> Self {
        Self {
            videos,
            user_store,
            upload_dir,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

struct UploadedFile {
    original_name: Option<String>,
    bytes: Vec<u8>,
}

/// Upload endpoint - POST /api/memes/upload (multipart: video, movieName, tags)
pub async fn upload(
    State(state): State<VideoState>,
    Extension(session): Extension<Session>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, VideoApiError> {
    let mut movie_name: Option<String> = None;
    let mut tags: Vec<String> = Vec::new();
    let mut file: Option<UploadedFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| VideoApiError::BadRequest("Upload failed: Invalid file or size exceeds 50MB"))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("video") => {
                if field.content_type() != Some(ACCEPTED_CONTENT_TYPE) {
                    return Err(VideoApiError::BadRequest("Only MP4 files are allowed"));
                }
                let original_name = field.file_name().map(str::to_string);

                let mut bytes = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(|_| {
                    VideoApiError::BadRequest("Upload failed: Invalid file or size exceeds 50MB")
                })? {
                    if bytes.len() + chunk.len() > state.max_upload_bytes {
                        return Err(VideoApiError::BadRequest("File too large"));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                file = Some(UploadedFile {
                    original_name,
                    bytes,
                });
            }
            Some("movieName") => {
                let text = field.text().await.map_err(|_| {
                    VideoApiError::BadRequest("Upload failed: Invalid file or size exceeds 50MB")
                })?;
                movie_name = Some(text.trim().to_string()).filter(|s| !s.is_empty());
            }
            Some("tags") => {
                let text = field.text().await.map_err(|_| {
                    VideoApiError::BadRequest("Upload failed: Invalid file or size exceeds 50MB")
                })?;
                tags = parse_tags(&text);
            }
            _ => {}
        }
    }

    let (Some(movie_name), Some(file)) = (movie_name, file) else {
        return Err(VideoApiError::BadRequest(
            "Movie name and video file are required",
        ));
    };

    let stored_path = stored_file_path(&state.upload_dir, file.original_name.as_deref());
    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(VideoApiError::internal)?;
    tokio::fs::write(&stored_path, &file.bytes)
        .await
        .map_err(VideoApiError::internal)?;

    let new_video = NewVideo {
        movie_name,
        file_path: stored_path.to_string_lossy().to_string(),
        uploaded_by: session.subject_id.clone(),
        tags,
    };
    let videos = state.videos.clone();
    let inserted = run_blocking(move || videos.insert_video(new_video)).await;
    let video = match inserted {
        Ok(video) => video,
        Err(e) => {
            // Don't leave an orphaned file behind.
            let _ = tokio::fs::remove_file(&stored_path).await;
            return Err(VideoApiError::internal(e));
        }
    };

    info!(
        video_id = %video.id,
        user_id = %session.subject_id,
        bytes = file.bytes.len(),
        "📤 Upload complete"
    );

    Ok(Json(json!({
        "msg": "Video uploaded successfully",
        "memeVideo": video,
    })))
}

/// `<unix-millis>-<random><ext>` inside the upload dir; only short
/// alphanumeric extensions from the client's filename survive.
fn stored_file_path(upload_dir: &FsPath, original_name: Option<&str>) -> PathBuf {
    let ext = original_name
        .and_then(|n| FsPath::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    let random = Uuid::new_v4().simple().to_string();
    let name = format!("{}-{}{}", Utc::now().timestamp_millis(), &random[..8], ext);
    upload_dir.join(name)
}

/// Search endpoint - GET /api/memes/search?movieName=&tag=
pub async fn search(
    State(state): State<VideoState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Video<Uploader>>>, VideoApiError> {
    let (movie_name, tag) = query.normalized();
    if movie_name.is_none() && tag.is_none() {
        return Err(VideoApiError::BadRequest("Movie name or tag is required"));
    }

    let videos = state.videos.clone();
    let users = state.user_store.clone();
    let results = run_blocking(move || {
        let found = videos.search(movie_name.as_deref(), tag.as_deref())?;

        // Resolve each distinct uploader once.
        let mut emails: HashMap<String, String> = HashMap::new();
        let mut results = Vec::with_capacity(found.len());
        for video in found {
            let email = match emails.get(&video.uploaded_by) {
                Some(email) => email.clone(),
                None => {
                    let email = match Uuid::parse_str(&video.uploaded_by) {
                        Ok(id) => users.get_user(&id)?.map(|u| u.email).unwrap_or_default(),
                        Err(_) => String::new(),
                    };
                    emails.insert(video.uploaded_by.clone(), email.clone());
                    email
                }
            };
            let uploader = Uploader {
                id: video.uploaded_by.clone(),
                email,
            };
            results.push(video.with_uploader(uploader));
        }
        Ok(results)
    })
    .await
    .map_err(VideoApiError::internal)?;

    Ok(Json(results))
}

/// Download endpoint - GET /api/memes/download/:id
pub async fn download(
    State(state): State<VideoState>,
    Path(video_id): Path<String>,
) -> Result<Response, VideoApiError> {
    let videos = state.videos.clone();
    let video = run_blocking(move || videos.get_video(&video_id))
        .await
        .map_err(VideoApiError::internal)?
        .ok_or(VideoApiError::NotFound)?;

    let file = match tokio::fs::File::open(&video.file_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(video_id = %video.id, "Stored file missing on disk");
            return Err(VideoApiError::NotFound);
        }
        Err(e) => return Err(VideoApiError::internal(e)),
    };

    let filename = FsPath::new(&video.file_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("video.mp4")
        .to_string();

    Ok((
        [
            (header::CONTENT_TYPE, ACCEPTED_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// Like toggle - POST /api/memes/:id/like
pub async fn toggle_like(
    State(state): State<VideoState>,
    Extension(session): Extension<Session>,
    Path(video_id): Path<String>,
) -> Result<Json<serde_json::Value>, VideoApiError> {
    let videos = state.videos.clone();
    let likes = run_blocking(move || videos.toggle_like(&video_id, &session.subject_id))
        .await
        .map_err(VideoApiError::internal)?
        .ok_or(VideoApiError::NotFound)?;

    Ok(Json(json!({ "msg": "Like updated", "likes": likes })))
}

/// Comment - POST /api/memes/:id/comment
pub async fn add_comment(
    State(state): State<VideoState>,
    Extension(session): Extension<Session>,
    Path(video_id): Path<String>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<serde_json::Value>, VideoApiError> {
    let text = payload.text.trim().to_string();
    if text.is_empty() {
        return Err(VideoApiError::BadRequest("Comment text is required"));
    }

    let videos = state.videos.clone();
    let comments = run_blocking(move || videos.add_comment(&video_id, &session.subject_id, &text))
        .await
        .map_err(VideoApiError::internal)?
        .ok_or(VideoApiError::NotFound)?;

    Ok(Json(json!({ "msg": "Comment added", "comments": comments })))
}

/// Video API errors
#[derive(Debug)]
pub enum VideoApiError {
    BadRequest(&'static str),
    NotFound,
    InternalError,
}

impl VideoApiError {
    pub fn internal(e: impl std::fmt::Display) -> Self {
        error!("Video request failed: {}", e);
        VideoApiError::InternalError
    }
}

impl IntoResponse for VideoApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            VideoApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            VideoApiError::NotFound => (StatusCode::NOT_FOUND, "Video not found"),
            VideoApiError::InternalError => (StatusCode::INTERNAL_SERVER_ERROR, "Server error"),
        };

        (status, Json(MessageResponse::new(message))).into_response()
    }
}
