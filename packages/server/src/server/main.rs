// Main entry point for API server

use anyhow::{Context, Result};
use mojifeed_core::kernel::{PgRecordStore, ServerDeps};
use mojifeed_core::server::{build_app, AppOptions, AppState};
use mojifeed_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mojifeed_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Mojifeed API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        asset_mode = %config.asset_mode,
        embedding_model = %config.embedding_model,
        dimensions = config.embedding_dimensions,
        "Configuration loaded"
    );

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    PgRecordStore::new(pool.clone(), config.embedding_dimensions)
        .check_dimensions()
        .await
        .context("Embedding column does not match EMBEDDING_DIMENSIONS")?;

    tokio::fs::create_dir_all(&config.blob_dir)
        .await
        .with_context(|| format!("Failed to create blob dir {}", config.blob_dir.display()))?;

    // Build application
    let deps = ServerDeps::from_config(&config, pool.clone())?;
    let app = build_app(
        AppState::new(deps, Some(pool)),
        AppOptions::from_config(&config),
    );

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Live feed: http://localhost:{}/api/streams/emoji-feed", config.port);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}
