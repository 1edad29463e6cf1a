//! Video Library Models

use serde::{Deserialize, Serialize};

/// Largest accepted upload (50 MiB)
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Only content type accepted for uploads
pub const ACCEPTED_CONTENT_TYPE: &str = "video/mp4";

/// Stored clip with its tags, likes and comments.
///
/// `U` is the uploader representation: a bare user id, or `Uploader` when the
/// caller asked for it to be resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Video<U = String> {
    pub id: String,
    pub movie_name: String,
    pub file_path: String,
    pub uploaded_by: U,
    pub upload_date: String,
    pub tags: Vec<String>,
    pub likes: Vec<String>,
    pub comments: Vec<Comment>,
}

impl Video<String> {
    pub fn with_uploader(self, uploader: Uploader) -> Video<Uploader> {
        Video {
            id: self.id,
            movie_name: self.movie_name,
            file_path: self.file_path,
            uploaded_by: uploader,
            upload_date: self.upload_date,
            tags: self.tags,
            likes: self.likes,
            comments: self.comments,
        }
    }
}

/// Resolved uploader, as returned by search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Uploader {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub user: String,
    pub date: String,
}

/// Everything needed to record a freshly stored upload
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub movie_name: String,
    pub file_path: String,
    pub uploaded_by: String,
    pub tags: Vec<String>,
}

/// Query string for GET /api/memes/search
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub movie_name: Option<String>,
    pub tag: Option<String>,
}

impl SearchQuery {
    /// Blank parameters count as absent.
    pub fn normalized(self) -> (Option<String>, Option<String>) {
        let clean = |v: Option<String>| {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        (clean(self.movie_name), clean(self.tag))
    }
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub text: String,
}

/// Split a comma-separated tag list, trimming and dropping empties.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
