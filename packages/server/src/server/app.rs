//! Application setup and server configuration.

use std::path::PathBuf;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::kernel::ServerDeps;
use crate::server::routes::{
    emoji_feed_stream, feed_handler, health_handler, search_handler, upload_handler,
};

/// Base64 inflates by 4/3; leave room above the 5 MiB decoded limit so
/// oversize files reach validation instead of being cut off by the extractor.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Backstop above the ingest upstream deadline plus the database write.
/// The pipeline answers first with a JSON 500; this only catches a hung store.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(150);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: ServerDeps,
    /// Present when backed by Postgres; used for pool stats in health checks
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(deps: ServerDeps, db_pool: Option<PgPool>) -> Self {
        Self { deps, db_pool }
    }
}

/// Router knobs that come from configuration rather than dependencies.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Empty means any origin
    pub allowed_origins: Vec<String>,
    /// Directory served under `/blobs`
    pub blob_dir: Option<PathBuf>,
}

impl AppOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            allowed_origins: config.allowed_origins.clone(),
            blob_dir: Some(config.blob_dir.clone()),
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// Build the Axum application router
pub fn build_app(state: AppState, options: AppOptions) -> Router {
    let mut router = Router::new()
        // Ingestion (both paths run the same pipeline; the asset mode decides the output)
        .route("/emoji", post(upload_handler))
        .route("/sticker", post(upload_handler))
        .route("/search", get(search_handler))
        .route("/feed", get(feed_handler))
        .route("/api/streams/emoji-feed", get(emoji_feed_stream))
        .route("/health", get(health_handler));

    if let Some(dir) = options.blob_dir {
        router = router.nest_service("/blobs", ServeDir::new(dir));
    }

    router
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::INTERNAL_SERVER_ERROR,
            REQUEST_TIMEOUT,
        ))
        .layer(Extension(state))
        .layer(cors_layer(&options.allowed_origins))
        .layer(TraceLayer::new_for_http())
}
