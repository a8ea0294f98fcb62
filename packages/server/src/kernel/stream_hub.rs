//! In-process pub/sub hub for real-time streaming.
//!
//! Topic-keyed broadcast channels carrying JSON values. The ingestion pipeline
//! publishes inserted records here; SSE endpoints and in-process feeds subscribe.
//!
//! # Usage
//!
//! Producers:
//!   hub.publish_serialized(FEED_TOPIC, &FeedEvent::RecordInserted { record }).await?;
//!
//! Consumers:
//!   let rx = hub.subscribe(FEED_TOPIC).await;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

/// Thread-safe, cloneable pub/sub hub keyed by string topics.
#[derive(Clone)]
pub struct StreamHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<serde_json::Value>>>>,
    capacity: usize,
}

impl StreamHub {
    /// Create a new StreamHub with default capacity (256 messages per channel).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new StreamHub with the given channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Publish a JSON value to a topic. Returns how many subscribers received it.
    pub async fn publish(&self, topic: &str, value: serde_json::Value) -> usize {
        let channels = self.channels.read().await;
        match channels.get(topic) {
            // Err means no active receivers
            Some(tx) => tx.send(value).unwrap_or(0),
            None => 0,
        }
    }

    /// Serialize and publish a typed event.
    pub async fn publish_serialized<T: Serialize>(
        &self,
        topic: &str,
        event: &T,
    ) -> serde_json::Result<usize> {
        let value = serde_json::to_value(event)?;
        Ok(self.publish(topic, value).await)
    }

    /// Subscribe to a topic. Creates the channel if it doesn't exist.
    pub async fn subscribe(&self, topic: &str) -> broadcast::Receiver<serde_json::Value> {
        let mut channels = self.channels.write().await;
        let tx = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
        tx.subscribe()
    }

    /// Live receivers on a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.channels
            .read()
            .await
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Remove channels with zero subscribers (housekeeping).
    pub async fn cleanup(&self) {
        let mut channels = self.channels.write().await;
        channels.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}
