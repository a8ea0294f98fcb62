//! Conversion of StreamHub subscriptions into SSE event streams.
//!
//! A `connected` event is sent first; each hub value becomes an event named
//! after its `type` field; overflow becomes a `lagged` event with the count.

use std::convert::Infallible;

use axum::response::sse::Event;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

pub fn hub_events(
    rx: broadcast::Receiver<serde_json::Value>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let connected =
        stream::once(async { Ok::<_, Infallible>(Event::default().event("connected").data("ok")) });

    let events = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(value) => {
                let event_name = value
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("message")
                    .to_string();
                Event::default()
                    .event(event_name)
                    .json_data(&value)
                    .ok()
                    .map(Ok)
            }
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                tracing::warn!(missed = n, "SSE subscriber lagged");
                Event::default()
                    .event("lagged")
                    .json_data(serde_json::json!({ "missed": n }))
                    .ok()
                    .map(Ok)
            }
        }
    });

    connected.chain(events)
}
