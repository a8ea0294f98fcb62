//! GET /feed?limit= - the bulk load half of the live feed.

use axum::extract::{Extension, Query};
use axum::Json;
use serde::Serialize;

use crate::domains::emoji::actions::FeedParams;
use crate::domains::emoji::{EmojiError, Record};
use crate::server::app::AppState;

#[derive(Serialize)]
pub struct FeedResponse {
    pub records: Vec<Record>,
    pub count: usize,
}

pub async fn feed_handler(
    Extension(state): Extension<AppState>,
    Query(params): Query<FeedParams>,
) -> Result<Json<FeedResponse>, EmojiError> {
    let limit = params.validate()?;

    let records = state
        .deps
        .records
        .recent(limit as i64)
        .await
        .map_err(|e| EmojiError::persistence("Failed to load feed", e))?;

    Ok(Json(FeedResponse {
        count: records.len(),
        records,
    }))
}
