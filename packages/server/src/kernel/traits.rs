// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Pipelines (what to generate, embed, persist) live in the domain layer.
//
// Naming convention: Base* for trait names (e.g., BaseEmbeddingService)

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::domains::emoji::models::{NewRecord, Record, SearchResult};

// =============================================================================
// Embedding Service Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseEmbeddingService: Send + Sync {
    /// Generate embedding for text (fixed dimensionality per deployment)
    async fn generate(&self, text: &str) -> Result<Vec<f32>>;
}

// =============================================================================
// Visual Asset Generator Trait (Infrastructure - generative AI)
// =============================================================================

/// Visual produced by the generator, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedVisual {
    /// A single emoji glyph
    Glyph(String),
    /// Encoded image bytes that still need to be stored as a blob
    Image { bytes: Vec<u8>, content_type: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAsset {
    pub visual: GeneratedVisual,
    /// Raw description as returned by the model (may exceed 120 characters)
    pub description: String,
}

#[async_trait]
pub trait BaseAssetGenerator: Send + Sync {
    /// Turn an uploaded photo into a visual plus a short description
    async fn generate(&self, image: &[u8], mime_type: &str) -> Result<GeneratedAsset>;
}

// =============================================================================
// Record Store Trait (Infrastructure - Postgres + pgvector)
// =============================================================================

#[async_trait]
pub trait BaseRecordStore: Send + Sync {
    /// Persist a new record; the store assigns `created_at`
    async fn insert(&self, record: NewRecord) -> Result<Record>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Record>>;

    /// Most recent records, newest first
    async fn recent(&self, limit: i64) -> Result<Vec<Record>>;

    /// Records with cosine similarity >= threshold, best first, at most `limit`
    async fn query_similar(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<SearchResult>>;

    /// Cheap liveness probe
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Blob Store Trait (Infrastructure - sticker images)
// =============================================================================

#[async_trait]
pub trait BaseBlobStore: Send + Sync {
    /// Store bytes and return their public URL
    async fn upload(&self, bytes: &[u8], content_type: &str) -> Result<String>;
}
