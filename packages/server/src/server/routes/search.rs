//! GET /search?q=&limit=&threshold=

use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    Json,
};

use crate::domains::emoji::actions::{search_records, SearchParams, SearchResponse};
use crate::domains::emoji::{EmojiError, FieldError};
use crate::server::app::AppState;

pub async fn search_handler(
    Extension(state): Extension<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, EmojiError> {
    let Query(params) = params.map_err(|rejection| {
        EmojiError::validation(
            "Invalid search parameters",
            vec![FieldError::new("query", rejection.body_text())],
        )
    })?;

    Ok(Json(search_records(params, &state.deps).await?))
}
