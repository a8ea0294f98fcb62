//! Semantic search over stored descriptions.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domains::emoji::actions::validation::{SearchParams, SearchQuery};
use crate::domains::emoji::errors::{EmojiError, EmojiResult};
use crate::domains::emoji::models::SearchResult;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    /// The trimmed query that was embedded
    pub query: String,
    pub count: usize,
}

/// Validate raw params and search.
pub async fn search_records(params: SearchParams, deps: &ServerDeps) -> EmojiResult<SearchResponse> {
    let query = params.validate()?;
    search(&query, deps).await
}

/// Embed the query, fetch candidates and rank them.
pub async fn search(query: &SearchQuery, deps: &ServerDeps) -> EmojiResult<SearchResponse> {
    let embedding = deps
        .embedding_service
        .generate(&query.query)
        .await
        .map_err(|e| EmojiError::upstream("Internal server error", e.context("query embedding failed")))?;

    let candidates = deps
        .records
        .query_similar(&embedding, query.threshold, query.limit as i64)
        .await
        .map_err(|e| EmojiError::persistence("Search failed", e))?;

    let candidate_count = candidates.len();
    let results = rank_results(candidates, query.threshold, query.limit as usize);
    debug!(
        query = %query.query,
        threshold = query.threshold,
        candidates = candidate_count,
        returned = results.len(),
        "Search complete"
    );

    Ok(SearchResponse {
        count: results.len(),
        query: query.query.clone(),
        results,
    })
}

/// Enforce the result contract regardless of what the store returned:
/// nothing below `threshold`, similarity clamped to [0, 1], ordered by
/// similarity desc then `created_at` desc then `id` asc, at most `limit`.
pub fn rank_results(
    mut results: Vec<SearchResult>,
    threshold: f64,
    limit: usize,
) -> Vec<SearchResult> {
    results.retain(|r| !r.similarity.is_nan() && r.similarity >= threshold);
    for r in &mut results {
        r.similarity = r.similarity.clamp(0.0, 1.0);
    }

    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.record.created_at.cmp(&a.record.created_at))
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    results.truncate(limit);
    results
}
