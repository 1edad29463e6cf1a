//! Server configuration
//!
//! Every setting can come from a flag or an environment variable (`.env` is
//! loaded first by the binary).

use anyhow::{ensure, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// HS256 keys shorter than this are rejected at startup.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Parser, Debug, Clone)]
#[command(name = "memevault")]
#[command(about = "Short-video sharing API with revocable session tokens")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:5000")]
    pub bind: SocketAddr,

    /// HMAC key used to sign session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Session token lifetime in seconds
    #[arg(long, env = "TOKEN_TTL_SECS", default_value = "3600")]
    pub token_ttl_secs: i64,

    /// SQLite database file for users and videos
    #[arg(long, env = "DB_PATH", default_value = "memevault.db")]
    pub db_path: String,

    /// Directory uploaded clips are written to
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Largest accepted video file, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "52428800")]
    pub max_upload_bytes: usize,

    /// Redis URL for the shared revocation store (in-memory when unset)
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Redis connection pool size
    #[arg(long, env = "REDIS_POOL_SIZE", default_value = "8")]
    pub redis_pool_size: usize,

    /// Redis connect/wait timeout in milliseconds
    #[arg(long, env = "REDIS_TIMEOUT_MS", default_value = "2000")]
    pub redis_timeout_ms: u64,

    /// bcrypt work factor for new password hashes
    #[arg(long, env = "BCRYPT_COST", default_value = "10")]
    pub bcrypt_cost: u32,

    /// Requests per minute per IP on register/login
    #[arg(long, env = "AUTH_RATE_LIMIT_PER_MIN", default_value = "30")]
    pub auth_rate_limit: u32,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.jwt_secret.len() >= MIN_SECRET_LEN,
            "JWT_SECRET must be at least {} bytes",
            MIN_SECRET_LEN
        );
        ensure!(self.token_ttl_secs > 0, "TOKEN_TTL_SECS must be positive");
        ensure!(
            (4..=31).contains(&self.bcrypt_cost),
            "BCRYPT_COST must be between 4 and 31"
        );
        ensure!(self.auth_rate_limit > 0, "AUTH_RATE_LIMIT_PER_MIN must be positive");
        ensure!(self.max_upload_bytes > 0, "MAX_UPLOAD_BYTES must be positive");
        Ok(())
    }

    pub fn redis_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_timeout_ms)
    }
}
