//! Postgres + pgvector implementation of BaseRecordStore.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::BaseRecordStore;
use crate::domains::emoji::models::{NewRecord, Record, SearchResult};

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    dimensions: usize,
}

impl PgRecordStore {
    pub fn new(pool: PgPool, dimensions: usize) -> Self {
        Self { pool, dimensions }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fail fast when the `embedding` column was created with another width.
    pub async fn check_dimensions(&self) -> Result<()> {
        // pgvector stores the declared dimension in atttypmod
        let declared: i32 = sqlx::query_scalar(
            r#"
            SELECT atttypmod FROM pg_attribute
            WHERE attrelid = 'emoji'::regclass AND attname = 'embedding'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        if declared != self.dimensions as i32 {
            bail!(
                "emoji.embedding is vector({}), configured for {}",
                declared,
                self.dimensions
            );
        }
        Ok(())
    }
}

#[async_trait]
impl BaseRecordStore for PgRecordStore {
    async fn insert(&self, record: NewRecord) -> Result<Record> {
        record.ensure_dimensions(self.dimensions)?;
        Record::create(&record, &self.pool).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Record>> {
        Record::find_by_id(id, &self.pool).await
    }

    async fn recent(&self, limit: i64) -> Result<Vec<Record>> {
        Record::find_recent(limit, &self.pool).await
    }

    async fn query_similar(
        &self,
        embedding: &[f32],
        threshold: f64,
        limit: i64,
    ) -> Result<Vec<SearchResult>> {
        Record::search_by_similarity(embedding, threshold, limit, &self.pool).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
