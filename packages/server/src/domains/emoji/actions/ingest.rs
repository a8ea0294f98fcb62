//! Upload ingestion: photo in, persisted emoji/sticker record out.
//!
//! generate -> truncate -> embed -> (blob upload) -> insert -> publish.
//! Each step depends on the previous one; nothing is written unless every
//! upstream call succeeded. The upstream steps share one deadline. Once they
//! are done, insert and publish run on their own task so a dropped request
//! cannot leave a committed record unannounced.

use std::time::{Duration, Instant};

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::domains::emoji::actions::validation::{UploadRequest, ValidatedUpload};
use crate::domains::emoji::errors::{EmojiError, EmojiResult};
use crate::domains::emoji::events::{FeedEvent, FEED_TOPIC};
use crate::domains::emoji::models::{truncate_description, NewRecord, Record, Visual};
use crate::kernel::{GeneratedVisual, ServerDeps};

const UPSTREAM_FAILURE: &str = "Internal server error";
const SAVE_FAILURE: &str = "Failed to save emoji";

/// Budget for generate + embed + blob upload together. Stays below the
/// router timeout so a slow model surfaces as a 500 with a body.
pub const UPSTREAM_DEADLINE: Duration = Duration::from_secs(120);

/// Validate a raw upload request and run it through the pipeline.
pub async fn ingest_upload(request: UploadRequest, deps: &ServerDeps) -> EmojiResult<Record> {
    let upload = request.validate()?;
    ingest(&upload, deps).await
}

/// Run an already-validated upload through the pipeline.
pub async fn ingest(upload: &ValidatedUpload, deps: &ServerDeps) -> EmojiResult<Record> {
    let started = Instant::now();
    debug!(
        bytes = upload.bytes.len(),
        mime_type = %upload.mime_type,
        mode = %deps.asset_mode,
        "Ingesting upload"
    );

    let (visual, description, embedding) =
        tokio::time::timeout(UPSTREAM_DEADLINE, generate_assets(upload, deps))
            .await
            .map_err(|_| {
                EmojiError::upstream(
                    UPSTREAM_FAILURE,
                    anyhow!("upstream calls exceeded {:?}", UPSTREAM_DEADLINE),
                )
            })??;

    let handle = tokio::spawn(commit(
        deps.clone(),
        NewRecord::new(visual, description, embedding),
    ));
    let record = handle
        .await
        .map_err(|e| EmojiError::persistence(SAVE_FAILURE, e.into()))??;

    info!(
        record_id = %record.id,
        description = %record.description,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Record created"
    );

    Ok(record)
}

async fn generate_assets(
    upload: &ValidatedUpload,
    deps: &ServerDeps,
) -> EmojiResult<(Visual, String, Vec<f32>)> {
    let asset = deps
        .asset_generator
        .generate(&upload.bytes, &upload.mime_type)
        .await
        .map_err(|e| EmojiError::upstream(UPSTREAM_FAILURE, e.context("asset generation failed")))?;

    let description = truncate_description(&asset.description);

    let embedding = deps
        .embedding_service
        .generate(&description)
        .await
        .map_err(|e| EmojiError::upstream(UPSTREAM_FAILURE, e.context("embedding failed")))?;

    let visual = match asset.visual {
        GeneratedVisual::Glyph(glyph) => Visual::Glyph(glyph),
        GeneratedVisual::Image {
            bytes,
            content_type,
        } => {
            let url = deps
                .blobs
                .upload(&bytes, &content_type)
                .await
                .map_err(|e| EmojiError::upstream(UPSTREAM_FAILURE, e.context("blob upload failed")))?;
            Visual::ImageUrl(url)
        }
    };

    Ok((visual, description, embedding))
}

/// Insert then announce. Runs detached from the request future.
async fn commit(deps: ServerDeps, new: NewRecord) -> EmojiResult<Record> {
    let record = deps
        .records
        .insert(new)
        .await
        .map_err(|e| EmojiError::persistence(SAVE_FAILURE, e))?;

    let event = FeedEvent::RecordInserted {
        record: record.clone(),
    };
    match deps.stream_hub.publish_serialized(FEED_TOPIC, &event).await {
        Ok(delivered) => debug!(record_id = %record.id, delivered, "Published insert"),
        // The record is committed; feeds pick it up on their next bulk load
        Err(e) => warn!(record_id = %record.id, error = %e, "Failed to publish insert"),
    }

    Ok(record)
}
