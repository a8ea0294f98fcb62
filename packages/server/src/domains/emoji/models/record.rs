use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Maximum stored description length, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 120;

/// The generated visual of a record. Serialized as either `"emoji"` or
/// `"sticker_url"` on the record object itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visual {
    #[serde(rename = "emoji")]
    Glyph(String),
    #[serde(rename = "sticker_url")]
    ImageUrl(String),
}

/// A persisted emoji/sticker. Append-only: created once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,
    #[serde(flatten)]
    pub visual: Visual,
    pub description: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload. The store assigns `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub id: Uuid,
    pub visual: Visual,
    pub description: String,
    pub embedding: Vec<f32>,
}

/// Record plus its cosine similarity to a query, in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub record: Record,
    pub similarity: f64,
}

impl NewRecord {
    pub fn new(visual: Visual, description: String, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            visual,
            description,
            embedding,
        }
    }

    /// Reject writes whose embedding length differs from the table's dimension.
    pub fn ensure_dimensions(&self, expected: usize) -> Result<()> {
        if self.embedding.len() != expected {
            bail!(
                "embedding dimension mismatch: expected {}, got {}",
                expected,
                self.embedding.len()
            );
        }
        Ok(())
    }

    /// Materialize the record as the store would return it.
    pub fn into_record(self, created_at: DateTime<Utc>) -> Record {
        Record {
            id: self.id,
            visual: self.visual,
            description: self.description,
            embedding: self.embedding,
            created_at,
        }
    }
}

/// Cut a description to at most 120 characters, ending in "..." when cut.
pub fn truncate_description(description: &str) -> String {
    let trimmed = description.trim();
    if trimmed.chars().count() <= MAX_DESCRIPTION_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(MAX_DESCRIPTION_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

// =============================================================================
// Database rows
// =============================================================================

#[derive(Debug, FromRow)]
struct EmojiRow {
    id: Uuid,
    emoji: Option<String>,
    sticker_url: Option<String>,
    description: String,
    embedding: Vector,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct EmojiSearchRow {
    #[sqlx(flatten)]
    row: EmojiRow,
    similarity: f64,
}

impl TryFrom<EmojiRow> for Record {
    type Error = anyhow::Error;

    fn try_from(row: EmojiRow) -> Result<Self> {
        let visual = match (row.emoji, row.sticker_url) {
            (Some(glyph), None) => Visual::Glyph(glyph),
            (None, Some(url)) => Visual::ImageUrl(url),
            _ => return Err(anyhow!("emoji row {} has no single visual", row.id)),
        };

        Ok(Record {
            id: row.id,
            visual,
            description: row.description,
            embedding: row.embedding.to_vec(),
            created_at: row.created_at,
        })
    }
}

const COLUMNS: &str = "id, emoji, sticker_url, description, embedding, created_at";

impl Record {
    pub async fn create(new: &NewRecord, pool: &PgPool) -> Result<Self> {
        let (emoji, sticker_url) = match &new.visual {
            Visual::Glyph(glyph) => (Some(glyph.as_str()), None),
            Visual::ImageUrl(url) => (None, Some(url.as_str())),
        };

        let row = sqlx::query_as::<_, EmojiRow>(&format!(
            "INSERT INTO emoji (id, emoji, sticker_url, description, embedding)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        ))
        .bind(new.id)
        .bind(emoji)
        .bind(sticker_url)
        .bind(&new.description)
        .bind(Vector::from(new.embedding.clone()))
        .fetch_one(pool)
        .await?;

        row.try_into()
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, EmojiRow>(&format!("SELECT {COLUMNS} FROM emoji WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(Record::try_from)
            .transpose()
    }

    /// Most recent records, newest first.
    pub async fn find_recent(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, EmojiRow>(&format!(
            "SELECT {COLUMNS} FROM emoji ORDER BY created_at DESC, id LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(Record::try_from)
        .collect()
    }

    /// Search records by cosine similarity to a query embedding.
    ///
    /// Only rows with similarity >= `match_threshold` are returned, closest
    /// first, ties broken by `created_at` descending then `id`.
    pub async fn search_by_similarity(
        query_embedding: &[f32],
        match_threshold: f64,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<SearchResult>> {
        let vector = Vector::from(query_embedding.to_vec());

        let rows = sqlx::query_as::<_, EmojiSearchRow>(&format!(
            r#"
            SELECT {COLUMNS},
                (1 - (embedding <=> $1))::float8 AS similarity
            FROM emoji
            WHERE (1 - (embedding <=> $1)) >= $2
            ORDER BY embedding <=> $1, created_at DESC, id
            LIMIT $3
            "#
        ))
        .bind(vector)
        .bind(match_threshold)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(SearchResult {
                    record: r.row.try_into()?,
                    similarity: r.similarity,
                })
            })
            .collect()
    }
}
