//! Request validation for uploads, searches and feed reads.
//!
//! Everything here runs before any external service is touched.

use base64::Engine;
use serde::Deserialize;

use crate::domains::emoji::errors::{EmojiError, EmojiResult, FieldError};

/// Largest accepted decoded upload (5 MiB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

pub const MAX_QUERY_CHARS: usize = 500;
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const MAX_SEARCH_LIMIT: u32 = 50;
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Bulk-load size for the live feed.
pub const FEED_PAGE_SIZE: u32 = 50;

const INVALID_REQUEST: &str = "Invalid request data";
const INVALID_SEARCH: &str = "Invalid search parameters";

// =============================================================================
// Upload
// =============================================================================

/// Raw upload body: `{ "file": "<base64>", "mimeType": "image/png" }`
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl UploadRequest {
    pub fn validate(self) -> EmojiResult<ValidatedUpload> {
        let mut details = Vec::new();

        let file = self.file.unwrap_or_default();
        if file.trim().is_empty() {
            details.push(FieldError::new("file", "File is required"));
        }

        let mime_type = self
            .mime_type
            .map(|m| m.trim().to_ascii_lowercase())
            .unwrap_or_default();
        if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
            details.push(FieldError::new(
                "mimeType",
                "Only JPEG and PNG images are allowed",
            ));
        }

        if !details.is_empty() {
            return Err(EmojiError::validation(INVALID_REQUEST, details));
        }

        let bytes = decode_base64_payload(&file).ok_or_else(|| {
            EmojiError::validation(
                INVALID_REQUEST,
                vec![FieldError::new("file", "File must be valid base64")],
            )
        })?;

        if bytes.is_empty() {
            return Err(EmojiError::validation(
                INVALID_REQUEST,
                vec![FieldError::new("file", "File is required")],
            ));
        }

        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(EmojiError::validation(
                "File size must be less than 5MB",
                vec![FieldError::new(
                    "file",
                    format!("{} bytes exceeds {} bytes", bytes.len(), MAX_UPLOAD_BYTES),
                )],
            ));
        }

        Ok(ValidatedUpload { bytes, mime_type })
    }
}

/// Decode base64, accepting an optional `data:<mime>;base64,` prefix and
/// embedded whitespace.
fn decode_base64_payload(file: &str) -> Option<Vec<u8>> {
    let payload = match file.trim().strip_prefix("data:") {
        Some(rest) => rest.split_once(";base64,")?.1,
        None => file,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .ok()
}

// =============================================================================
// Search
// =============================================================================

/// Raw query string of `GET /search`. Numbers stay strings so bad input is a
/// field-level validation error rather than an extractor rejection.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<String>,
    pub threshold: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Trimmed query text
    pub query: String,
    pub limit: u32,
    pub threshold: f64,
}

impl SearchParams {
    pub fn validate(self) -> EmojiResult<SearchQuery> {
        let mut details = Vec::new();

        let query = self.q.unwrap_or_default().trim().to_string();
        if query.is_empty() {
            details.push(FieldError::new("q", "Search query is required"));
        } else if query.chars().count() > MAX_QUERY_CHARS {
            details.push(FieldError::new("q", "Query too long"));
        }

        let limit = match parse_limit(self.limit.as_deref(), DEFAULT_SEARCH_LIMIT) {
            Ok(limit) => limit,
            Err(e) => {
                details.push(e);
                DEFAULT_SEARCH_LIMIT
            }
        };

        let threshold = match non_blank(self.threshold.as_deref()) {
            None => DEFAULT_THRESHOLD,
            Some(raw) => match raw.parse::<f64>() {
                Ok(t) if t.is_finite() && (0.0..=1.0).contains(&t) => t,
                Ok(t) if t.is_finite() => {
                    details.push(FieldError::new("threshold", "threshold must be between 0 and 1"));
                    DEFAULT_THRESHOLD
                }
                _ => {
                    details.push(FieldError::new("threshold", "threshold must be a number"));
                    DEFAULT_THRESHOLD
                }
            },
        };

        if !details.is_empty() {
            return Err(EmojiError::validation(INVALID_SEARCH, details));
        }

        Ok(SearchQuery {
            query,
            limit,
            threshold,
        })
    }
}

// =============================================================================
// Feed
// =============================================================================

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FeedParams {
    pub limit: Option<String>,
}

impl FeedParams {
    pub fn validate(self) -> EmojiResult<u32> {
        parse_limit(self.limit.as_deref(), FEED_PAGE_SIZE)
            .map_err(|e| EmojiError::validation(INVALID_REQUEST, vec![e]))
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_limit(raw: Option<&str>, default: u32) -> Result<u32, FieldError> {
    let Some(raw) = non_blank(raw) else {
        return Ok(default);
    };
    match raw.parse::<i64>() {
        Ok(n) if (1..=MAX_SEARCH_LIMIT as i64).contains(&n) => Ok(n as u32),
        Ok(_) => Err(FieldError::new(
            "limit",
            format!("limit must be between 1 and {}", MAX_SEARCH_LIMIT),
        )),
        Err(_) => Err(FieldError::new("limit", "limit must be an integer")),
    }
}
