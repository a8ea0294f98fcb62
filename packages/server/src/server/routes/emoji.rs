//! Upload endpoint.
//!
//! POST /emoji and POST /sticker with `{ "file": "<base64>", "mimeType": "image/png" }`

use axum::{
    extract::{rejection::JsonRejection, Extension},
    Json,
};
use serde_json::{Map, Value};

use crate::domains::emoji::actions::{ingest_upload, UploadRequest};
use crate::domains::emoji::{EmojiError, FieldError};
use crate::server::app::AppState;

/// Run the ingestion pipeline and answer `{success, emoji}` or
/// `{success, sticker}` depending on the asset mode.
pub async fn upload_handler(
    Extension(state): Extension<AppState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Result<Json<Value>, EmojiError> {
    // Malformed JSON is a field-level validation error like any other bad input
    let Json(request) = payload.map_err(|rejection| {
        EmojiError::validation(
            "Invalid request data",
            vec![FieldError::new("body", rejection.body_text())],
        )
    })?;

    let record = ingest_upload(request, &state.deps).await?;
    let record = serde_json::to_value(&record).map_err(|e| {
        EmojiError::persistence("Failed to save emoji", anyhow::Error::new(e))
    })?;

    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    body.insert(state.deps.asset_mode.response_key().to_string(), record);
    Ok(Json(Value::Object(body)))
}
