//! Server dependencies for domain actions (using traits for testability)
//!
//! This module provides the central dependency container used by the ingestion,
//! search and feed code. All external services use trait abstractions so tests
//! can swap in the mocks from `test_dependencies`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use openai_client::OpenAIClient;
use sqlx::PgPool;

use crate::config::{AssetMode, Config};
use crate::kernel::{
    ai::{OpenAIAssetGenerator, OpenAIEmbeddingService},
    blob_store::LocalBlobStore,
    record_store::PgRecordStore,
    stream_hub::StreamHub,
    BaseAssetGenerator, BaseBlobStore, BaseEmbeddingService, BaseRecordStore,
};

/// Upper bound for a single OpenAI call. Ingest also bounds the calls
/// together with `UPSTREAM_DEADLINE`.
const OPENAI_TIMEOUT: Duration = Duration::from_secs(60);

/// Server dependencies accessible to actions and handlers
#[derive(Clone)]
pub struct ServerDeps {
    pub records: Arc<dyn BaseRecordStore>,
    pub blobs: Arc<dyn BaseBlobStore>,
    pub embedding_service: Arc<dyn BaseEmbeddingService>,
    pub asset_generator: Arc<dyn BaseAssetGenerator>,
    /// In-process pub/sub hub for real-time streaming to SSE endpoints
    pub stream_hub: StreamHub,
    pub asset_mode: AssetMode,
}

impl ServerDeps {
    pub fn new(
        records: Arc<dyn BaseRecordStore>,
        blobs: Arc<dyn BaseBlobStore>,
        embedding_service: Arc<dyn BaseEmbeddingService>,
        asset_generator: Arc<dyn BaseAssetGenerator>,
        stream_hub: StreamHub,
        asset_mode: AssetMode,
    ) -> Self {
        Self {
            records,
            blobs,
            embedding_service,
            asset_generator,
            stream_hub,
            asset_mode,
        }
    }

    /// Wire the production implementations from configuration.
    pub fn from_config(config: &Config, pool: PgPool) -> Result<Self> {
        let openai = OpenAIClient::new(config.openai_api_key.clone())
            .with_timeout(OPENAI_TIMEOUT)
            .context("Failed to build OpenAI client")?;

        Ok(Self::new(
            Arc::new(PgRecordStore::new(pool, config.embedding_dimensions)),
            Arc::new(LocalBlobStore::new(
                config.blob_dir.clone(),
                config.blob_base_url(),
            )),
            Arc::new(OpenAIEmbeddingService::new(
                openai.clone(),
                config.embedding_model.clone(),
                config.embedding_dimensions,
            )),
            Arc::new(OpenAIAssetGenerator::new(
                openai,
                config.vision_model.clone(),
                config.image_model.clone(),
                config.asset_mode,
            )),
            StreamHub::new(),
            config.asset_mode,
        ))
    }
}
