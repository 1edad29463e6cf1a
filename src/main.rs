//! memevault - short clip sharing API
//! Mission: Register, log in, upload, search, like, comment, log out

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::path::Path;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, time::interval};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memevault::{
    auth::{
        AuthState, Clock, JwtHandler, MemoryRevocationStore, RedisRevocationStore,
        RevocationStore, SessionGate, SystemClock, UserStore,
    },
    build_router,
    middleware::{RateLimitConfig, RateLimitLayer},
    videos::{VideoState, VideoStore},
    AppContext, Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();

    let config = Config::parse();
    config.validate().context("Invalid configuration")?;

    info!("🚀 memevault starting");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let user_store = Arc::new(UserStore::new(&config.db_path, config.bcrypt_cost)?);
    let video_store = Arc::new(VideoStore::new(&config.db_path)?);
    info!("📊 Database initialized at: {}", config.db_path);

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.upload_dir.display()))?;

    let revocation_store: Arc<dyn RevocationStore> = match config.redis_url.as_deref() {
        Some(url) => Arc::new(
            RedisRevocationStore::connect(url, config.redis_pool_size, config.redis_timeout())
                .await?,
        ),
        None => {
            warn!("⚠️  REDIS_URL not set - revocations are local to this process");
            let store = Arc::new(MemoryRevocationStore::new(clock.clone()));
            tokio::spawn(revocation_purge_polling(store.clone()));
            store
        }
    };

    let jwt_handler = Arc::new(JwtHandler::new(
        config.jwt_secret.as_bytes(),
        config.token_ttl_secs,
        clock,
    ));
    let gate = Arc::new(SessionGate::new(jwt_handler, revocation_store));
    info!(
        "🔐 Authentication initialized (token ttl {}s)",
        config.token_ttl_secs
    );

    let rate_limiter = RateLimitLayer::new(RateLimitConfig::per_minute(config.auth_rate_limit));
    tokio::spawn(rate_limit_cleanup_polling(rate_limiter.clone()));

    let ctx = AppContext {
        auth: AuthState::new(user_store.clone(), gate.clone()),
        videos: VideoState::new(video_store, user_store, config.upload_dir.clone())
            .with_max_upload_bytes(config.max_upload_bytes),
        gate,
        rate_limiter,
    };
    let app = build_router(ctx);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("🎯 API server listening on {}", config.bind);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

async fn revocation_purge_polling(store: Arc<MemoryRevocationStore>) {
    let mut ticker = interval(Duration::from_secs(60));
    loop {
        ticker.tick().await;
        let purged = store.purge_expired();
        if purged > 0 {
            debug!("🧹 Purged {} expired revocation entries", purged);
        }
    }
}

async fn rate_limit_cleanup_polling(limiter: RateLimitLayer) {
    let mut ticker = interval(Duration::from_secs(120));
    loop {
        ticker.tick().await;
        limiter.cleanup();
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memevault=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate root (common when running with --manifest-path from elsewhere)
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
