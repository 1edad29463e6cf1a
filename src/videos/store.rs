//! Video Storage
//! Mission: Persist clip metadata, tags, likes and comments in SQLite

use crate::videos::models::{Comment, NewVideo, Video};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{functions::FunctionFlags, params, Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

/// Video metadata storage with SQLite backend
pub struct VideoStore {
    db_path: String,
}

impl VideoStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open video db at {}", self.db_path))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS videos (
                id TEXT PRIMARY KEY,
                movie_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                uploaded_by TEXT NOT NULL,
                upload_date TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_videos_uploaded_by ON videos(uploaded_by);

            CREATE TABLE IF NOT EXISTS video_tags (
                video_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (video_id, position)
            );

            CREATE TABLE IF NOT EXISTS video_likes (
                video_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                liked_at TEXT NOT NULL,
                PRIMARY KEY (video_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS video_comments (
                id TEXT PRIMARY KEY,
                video_id TEXT NOT NULL,
                text TEXT NOT NULL,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_video_comments_video ON video_comments(video_id);",
        )?;

        Ok(())
    }

    /// Record a new upload
    pub fn insert_video(&self, new: NewVideo) -> Result<Video> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let video = Video {
            id: Uuid::new_v4().to_string(),
            movie_name: new.movie_name,
            file_path: new.file_path,
            uploaded_by: new.uploaded_by,
            upload_date: Utc::now().to_rfc3339(),
            tags: new.tags,
            likes: Vec::new(),
            comments: Vec::new(),
        };

        tx.execute(
            "INSERT INTO videos (id, movie_name, file_path, uploaded_by, upload_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                video.id,
                video.movie_name,
                video.file_path,
                video.uploaded_by,
                video.upload_date,
            ],
        )
        .context("Failed to insert video")?;

        for (position, tag) in video.tags.iter().enumerate() {
            tx.execute(
                "INSERT INTO video_tags (video_id, position, tag) VALUES (?1, ?2, ?3)",
                params![video.id, position as i64, tag],
            )?;
        }

        tx.commit()?;

        info!(video_id = %video.id, tags = video.tags.len(), "🎬 Video stored");
        Ok(video)
    }

    /// Fetch one video with everything attached
    pub fn get_video(&self, video_id: &str) -> Result<Option<Video>> {
        let conn = self.conn()?;
        load_video(&conn, video_id)
    }

    /// All videos uploaded by one user, newest first
    pub fn list_by_uploader(&self, user_id: &str) -> Result<Vec<Video>> {
        let conn = self.conn()?;
        let ids: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT id FROM videos WHERE uploaded_by = ?1 ORDER BY upload_date DESC",
            )?;
            let rows = stmt.query_map(params![user_id], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut videos = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(video) = load_video(&conn, &id)? {
                videos.push(video);
            }
        }
        Ok(videos)
    }

    /// Case-insensitive substring search on name and/or tag, newest first.
    ///
    /// Both filters combine with AND; the caller guarantees at least one is set.
    /// Case folding is Unicode-aware, so "AMÉLIE" finds "Amélie".
    pub fn search(&self, movie_name: Option<&str>, tag: Option<&str>) -> Result<Vec<Video>> {
        let conn = self.conn()?;
        register_fold_case(&conn)?;
        let name_needle = movie_name.map(str::to_lowercase);
        let tag_needle = tag.map(str::to_lowercase);

        let ids: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT v.id FROM videos v
                 WHERE (?1 IS NULL OR instr(fold_case(v.movie_name), ?1) > 0)
                   AND (?2 IS NULL OR EXISTS (
                        SELECT 1 FROM video_tags t
                        WHERE t.video_id = v.id AND instr(fold_case(t.tag), ?2) > 0))
                 ORDER BY v.upload_date DESC",
            )?;
            let rows = stmt.query_map(params![name_needle, tag_needle], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut videos = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(video) = load_video(&conn, &id)? {
                videos.push(video);
            }
        }

        debug!(hits = videos.len(), "Video search complete");
        Ok(videos)
    }

    /// Flip the user's like. Returns the resulting like list, or `None` if the
    /// video does not exist.
    pub fn toggle_like(&self, video_id: &str, user_id: &str) -> Result<Option<Vec<String>>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if !video_exists(&tx, video_id)? {
            return Ok(None);
        }

        let removed = tx.execute(
            "DELETE FROM video_likes WHERE video_id = ?1 AND user_id = ?2",
            params![video_id, user_id],
        )?;
        if removed == 0 {
            tx.execute(
                "INSERT INTO video_likes (video_id, user_id, liked_at) VALUES (?1, ?2, ?3)",
                params![video_id, user_id, Utc::now().to_rfc3339()],
            )?;
        }

        let likes = load_likes(&tx, video_id)?;
        tx.commit()?;
        Ok(Some(likes))
    }

    /// Append a comment. Returns all comments, or `None` if the video does not exist.
    pub fn add_comment(
        &self,
        video_id: &str,
        user_id: &str,
        text: &str,
    ) -> Result<Option<Vec<Comment>>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if !video_exists(&tx, video_id)? {
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO video_comments (id, video_id, text, user_id, date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                video_id,
                text,
                user_id,
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to insert comment")?;

        let comments = load_comments(&tx, video_id)?;
        tx.commit()?;
        Ok(Some(comments))
    }
}

/// `fold_case(text)`: Rust's Unicode lowercasing, exposed to SQL.
fn register_fold_case(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: String = ctx.get(0)?;
            Ok(text.to_lowercase())
        },
    )
    .context("Failed to register fold_case")
}

fn video_exists(conn: &Connection, video_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM videos WHERE id = ?1",
            params![video_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn load_video(conn: &Connection, video_id: &str) -> Result<Option<Video>> {
    let base = conn
        .query_row(
            "SELECT id, movie_name, file_path, uploaded_by, upload_date
             FROM videos WHERE id = ?1",
            params![video_id],
            |row| {
                Ok(Video {
                    id: row.get(0)?,
                    movie_name: row.get(1)?,
                    file_path: row.get(2)?,
                    uploaded_by: row.get(3)?,
                    upload_date: row.get(4)?,
                    tags: Vec::new(),
                    likes: Vec::new(),
                    comments: Vec::new(),
                })
            },
        )
        .optional()
        .context("Failed to load video")?;

    let Some(mut video) = base else {
        return Ok(None);
    };

    video.tags = {
        let mut stmt =
            conn.prepare("SELECT tag FROM video_tags WHERE video_id = ?1 ORDER BY position")?;
        let rows = stmt.query_map(params![video_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<String>, _>>()?
    };
    video.likes = load_likes(conn, video_id)?;
    video.comments = load_comments(conn, video_id)?;

    Ok(Some(video))
}

fn load_likes(conn: &Connection, video_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM video_likes WHERE video_id = ?1 ORDER BY liked_at, rowid",
    )?;
    let rows = stmt.query_map(params![video_id], |row| row.get(0))?;
    Ok(rows.collect::<Result<Vec<String>, _>>()?)
}

fn load_comments(conn: &Connection, video_id: &str) -> Result<Vec<Comment>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, user_id, date FROM video_comments
         WHERE video_id = ?1 ORDER BY date, rowid",
    )?;
    let rows = stmt.query_map(params![video_id], |row| {
        Ok(Comment {
            id: row.get(0)?,
            text: row.get(1)?,
            user: row.get(2)?,
            date: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
