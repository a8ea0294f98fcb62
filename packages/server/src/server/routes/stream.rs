//! SSE streaming endpoint.
//!
//! GET /api/streams/emoji-feed
//!
//! Subscribes to the StreamHub insert topic and forwards every committed
//! record as a `record_inserted` event. No auth: the feed is public.

use std::convert::Infallible;

use axum::{
    extract::Extension,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;

use crate::domains::emoji::FEED_TOPIC;
use crate::kernel::sse::hub_events;
use crate::server::app::AppState;

pub async fn emoji_feed_stream(
    Extension(state): Extension<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.deps.stream_hub.subscribe(FEED_TOPIC).await;
    tracing::debug!(topic = FEED_TOPIC, "SSE client subscribed");

    Sse::new(hub_events(rx)).keep_alive(KeepAlive::default())
}
