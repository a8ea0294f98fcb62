//! Emoji domain actions - entry-point business logic
//!
//! Called directly from HTTP handlers and the CLI. Actions take raw input,
//! validate it, and return final models/results.

pub mod ingest;
pub mod search;
pub mod validation;

pub use ingest::{ingest, ingest_upload, UPSTREAM_DEADLINE};
pub use search::{rank_results, search, search_records, SearchResponse};
pub use validation::{
    FeedParams, SearchParams, SearchQuery, UploadRequest, ValidatedUpload, MAX_UPLOAD_BYTES,
};
