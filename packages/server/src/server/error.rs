//! HTTP mapping of domain errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domains::emoji::{EmojiError, FieldError};

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "no_details")]
    details: &'a [FieldError],
}

fn no_details(details: &&[FieldError]) -> bool {
    details.is_empty()
}

impl IntoResponse for EmojiError {
    fn into_response(self) -> Response {
        match &self {
            EmojiError::Validation { message, details } => {
                tracing::debug!(error = %message, fields = details.len(), "Rejected request");
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorBody {
                        error: message,
                        details,
                    }),
                )
                    .into_response()
            }
            EmojiError::Upstream { message, source } | EmojiError::Persistence { message, source } => {
                // Only the generic message leaves the process
                tracing::error!(error = %message, source = ?source, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        error: message,
                        details: &[],
                    }),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_maps_to_400_with_details() {
        let response = EmojiError::validation(
            "Invalid request data",
            vec![FieldError::new("file", "File is required")],
        )
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid request data");
        assert_eq!(body["details"][0]["field"], "file");
    }

    #[tokio::test]
    async fn test_upstream_hides_source() {
        let response = EmojiError::upstream(
            "Internal server error",
            anyhow::anyhow!("sk-secret leaked in upstream message"),
        )
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body, serde_json::json!({ "error": "Internal server error" }));
    }
}
