use serde::{Deserialize, Serialize};

use crate::domains::emoji::models::Record;

/// StreamHub topic carrying every committed insert.
pub const FEED_TOPIC: &str = "emoji:inserts";

/// Emoji domain events
///
/// Immutable facts published after the store has committed. The `type` tag
/// doubles as the SSE event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    RecordInserted { record: Record },
}

impl FeedEvent {
    pub fn record(&self) -> &Record {
        match self {
            FeedEvent::RecordInserted { record } => record,
        }
    }

    pub fn into_record(self) -> Record {
        match self {
            FeedEvent::RecordInserted { record } => record,
        }
    }
}
