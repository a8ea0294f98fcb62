// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.
// Every mock records its calls so tests can assert what was (not) invoked.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::{
    BaseAssetGenerator, BaseBlobStore, BaseEmbeddingService, BaseRecordStore, GeneratedAsset,
    GeneratedVisual, ServerDeps, StreamHub,
};
use crate::config::AssetMode;
use crate::domains::emoji::models::{NewRecord, Record, SearchResult};

/// Cosine similarity of two equal-length vectors; 0.0 when either is all zeros.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    // Same form as pgvector so identical vectors land on exactly 1.0
    dot / (norm_a * norm_b).sqrt()
}

// =============================================================================
// Mock Embedding Service
// =============================================================================

pub struct MockEmbeddingService {
    // Returned when no pattern matches
    fixed_embedding: Vec<f32>,
    // (pattern, embedding): first pattern contained in the text wins
    pattern_embeddings: Arc<Mutex<Vec<(String, Vec<f32>)>>>,
    failure: Option<String>,
    // Track all texts that embeddings were generated for
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockEmbeddingService {
    pub fn new() -> Self {
        // Return a simple 1536-dimensional vector for testing
        Self {
            fixed_embedding: vec![0.1; 1536],
            pattern_embeddings: Arc::new(Mutex::new(Vec::new())),
            failure: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.fixed_embedding = embedding;
        self
    }

    /// When text contains `pattern` (case-insensitive), return this embedding
    pub fn with_pattern_embedding(self, pattern: &str, embedding: Vec<f32>) -> Self {
        self.pattern_embeddings
            .lock()
            .unwrap()
            .push((pattern.to_lowercase(), embedding));
        self
    }

    /// Fail every call with the given message
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Get all texts that were embedded
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockEmbeddingService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseEmbeddingService for MockEmbeddingService {
    async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.lock().unwrap().push(text.to_string());

        if let Some(message) = &self.failure {
            return Err(anyhow!("{}", message));
        }

        let lowered = text.to_lowercase();
        let patterns = self.pattern_embeddings.lock().unwrap();
        if let Some((_, embedding)) = patterns.iter().find(|(p, _)| lowered.contains(p)) {
            return Ok(embedding.clone());
        }

        Ok(self.fixed_embedding.clone())
    }
}

// =============================================================================
// Mock Asset Generator
// =============================================================================

/// Arguments captured from a generate call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateCallArgs {
    pub image_len: usize,
    pub mime_type: String,
}

pub struct MockAssetGenerator {
    responses: Arc<Mutex<Vec<Result<GeneratedAsset, String>>>>,
    calls: Arc<Mutex<Vec<GenerateCallArgs>>>,
    // Simulated model latency
    delay: Option<std::time::Duration>,
}

impl MockAssetGenerator {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Sleep this long before answering each call
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a glyph result
    pub fn with_glyph(self, glyph: &str, description: &str) -> Self {
        self.responses.lock().unwrap().push(Ok(GeneratedAsset {
            visual: GeneratedVisual::Glyph(glyph.to_string()),
            description: description.to_string(),
        }));
        self
    }

    /// Queue a sticker image result
    pub fn with_image(self, bytes: &[u8], description: &str) -> Self {
        self.responses.lock().unwrap().push(Ok(GeneratedAsset {
            visual: GeneratedVisual::Image {
                bytes: bytes.to_vec(),
                content_type: "image/png".to_string(),
            },
            description: description.to_string(),
        }));
        self
    }

    /// Queue a failure (e.g. malformed upstream response)
    pub fn with_failure(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<GenerateCallArgs> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockAssetGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseAssetGenerator for MockAssetGenerator {
    async fn generate(&self, image: &[u8], mime_type: &str) -> Result<GeneratedAsset> {
        self.calls.lock().unwrap().push(GenerateCallArgs {
            image_len: image.len(),
            mime_type: mime_type.to_string(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(GeneratedAsset {
                visual: GeneratedVisual::Glyph("🙂".to_string()),
                description: "a smiling face".to_string(),
            });
        }

        responses.remove(0).map_err(|message| anyhow!("{}", message))
    }
}

// =============================================================================
// In-memory Record Store
// =============================================================================

/// Record store with real cosine ranking, for tests that don't need Postgres.
///
/// Orders like the SQL query: similarity desc, then created_at desc, then id.
pub struct InMemoryRecordStore {
    records: Arc<Mutex<Vec<Record>>>,
    dimensions: usize,
    fail_writes: bool,
    fail_reads: bool,
    insert_calls: Arc<Mutex<usize>>,
}

impl InMemoryRecordStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            dimensions,
            fail_writes: false,
            fail_reads: false,
            insert_calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Reject every insert
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Reject every read and similarity query
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Seed a record directly (bypassing the pipeline)
    pub fn with_record(self, record: Record) -> Self {
        self.records.lock().unwrap().push(record);
        self
    }

    /// Seed a glyph record with an explicit timestamp
    pub fn with_glyph_record(
        self,
        description: &str,
        embedding: Vec<f32>,
        created_at: DateTime<Utc>,
    ) -> Self {
        self.with_record(Record {
            id: Uuid::new_v4(),
            visual: crate::domains::emoji::models::Visual::Glyph("🙂".to_string()),
            description: description.to_string(),
            embedding,
            created_at,
        })
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn insert_calls(&self) -> usize {
        *self.insert_calls.lock().unwrap()
    }

    // created_at strictly after every stored record, like a DB clock
    fn next_timestamp(records: &[Record]) -> DateTime<Utc> {
        let now = Utc::now();
        match records.iter().map(|r| r.created_at).max() {
            Some(latest) if latest >= now => latest + Duration::microseconds(1),
            _ => now,
        }
    }
}

#[async_trait]
impl BaseRecordStore for InMemoryRecordStore {
    async fn insert(&self, record: NewRecord) -> Result<Record> {
        *self.insert_calls.lock().unwrap() += 1;

        if self.fail_writes {
            return Err(anyhow!("insert rejected by store"));
        }
        record.ensure_dimensions(self.dimensions)?;

        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.id == record.id) {
            return Err(anyhow!("duplicate key value violates unique constraint"));
        }
        let created = record.into_record(Self::next_timestamp(&records));
        records.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Record>> {
        if self.fail_reads {
            return Err(anyhow!("read rejected by store"));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<Record>> {
        if self.fail_reads {
            return Err(anyhow!("read rejected by store"));
        }
        let mut records = self.records();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn query_similar(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<SearchResult>> {
        if self.fail_reads {
            return Err(anyhow!("similarity query rejected by store"));
        }
        let mut results: Vec<SearchResult> = self
            .records()
            .into_iter()
            .map(|record| {
                let similarity = cosine_similarity(embedding, &record.embedding);
                SearchResult { record, similarity }
            })
            .filter(|r| r.similarity >= threshold)
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| b.record.created_at.cmp(&a.record.created_at))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        results.truncate(limit.max(0) as usize);
        Ok(results)
    }

    async fn ping(&self) -> Result<()> {
        if self.fail_reads {
            return Err(anyhow!("store unavailable"));
        }
        Ok(())
    }
}

// =============================================================================
// Mock Blob Store
// =============================================================================

pub struct MockBlobStore {
    uploads: Arc<Mutex<Vec<(usize, String)>>>,
    fail: bool,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            uploads: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// (byte length, content type) of every upload
    pub fn uploads(&self) -> Vec<(usize, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseBlobStore for MockBlobStore {
    async fn upload(&self, bytes: &[u8], content_type: &str) -> Result<String> {
        if self.fail {
            return Err(anyhow!("blob storage unavailable"));
        }
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((bytes.len(), content_type.to_string()));
        Ok(format!("https://blobs.test/sticker-{}.png", uploads.len()))
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

pub struct TestDependencies {
    pub embedding_service: Arc<MockEmbeddingService>,
    pub asset_generator: Arc<MockAssetGenerator>,
    pub records: Arc<InMemoryRecordStore>,
    pub blobs: Arc<MockBlobStore>,
    pub stream_hub: StreamHub,
    pub asset_mode: AssetMode,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            embedding_service: Arc::new(MockEmbeddingService::new()),
            asset_generator: Arc::new(MockAssetGenerator::new()),
            records: Arc::new(InMemoryRecordStore::new(1536)),
            blobs: Arc::new(MockBlobStore::new()),
            stream_hub: StreamHub::new(),
            asset_mode: AssetMode::Glyph,
        }
    }

    /// Set a mock embedding service
    pub fn mock_embeddings(mut self, service: MockEmbeddingService) -> Self {
        self.embedding_service = Arc::new(service);
        self
    }

    /// Set a mock asset generator
    pub fn mock_generator(mut self, generator: MockAssetGenerator) -> Self {
        self.asset_generator = Arc::new(generator);
        self
    }

    /// Set the record store
    pub fn mock_records(mut self, store: InMemoryRecordStore) -> Self {
        self.records = Arc::new(store);
        self
    }

    /// Set a mock blob store
    pub fn mock_blobs(mut self, blobs: MockBlobStore) -> Self {
        self.blobs = Arc::new(blobs);
        self
    }

    pub fn asset_mode(mut self, mode: AssetMode) -> Self {
        self.asset_mode = mode;
        self
    }

    /// Build ServerDeps that share these mocks (the mocks stay inspectable)
    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.records.clone(),
            self.blobs.clone(),
            self.embedding_service.clone(),
            self.asset_generator.clone(),
            self.stream_hub.clone(),
            self.asset_mode,
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
