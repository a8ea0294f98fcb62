//! Live feed of records: one bulk load reconciled with the insert stream.
//!
//! A [`LiveFeed`] owns a single background task. The bulk load and the
//! subscription run concurrently; whichever lands first, the collection ends
//! up de-duplicated by id and ordered newest first. Dropping the feed aborts
//! the task, which releases the subscription. A subscriber that falls behind
//! the broadcast buffer reloads the recent page to fill the gap.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domains::emoji::actions::validation::FEED_PAGE_SIZE;
use crate::domains::emoji::events::{FeedEvent, FEED_TOPIC};
use crate::domains::emoji::models::Record;
use crate::kernel::{BaseRecordStore, ServerDeps, StreamHub};

/// What a [`FeedSource`] subscription delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    Inserted(Record),
    /// This many inserts were dropped before the subscriber saw them
    Lagged(u64),
}

pub type RecordStream = BoxStream<'static, Result<FeedUpdate>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    #[default]
    Connecting,
    Subscribed,
    Error,
    Closed,
}

// =============================================================================
// Collection
// =============================================================================

/// Newest-first records, unique by id.
#[derive(Debug, Clone, Default)]
pub struct FeedCollection {
    records: Vec<Record>,
    ids: HashSet<Uuid>,
}

impl FeedCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union a bulk load with whatever is already held.
    pub fn seed(&mut self, records: Vec<Record>) {
        for record in records {
            if self.ids.insert(record.id) {
                self.records.push(record);
            }
        }
        // Stable, so equal timestamps keep their arrival order
        self.records
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// Prepend a streamed record. Returns false if its id is already present.
    pub fn merge(&mut self, record: Record) -> bool {
        if !self.ids.insert(record.id) {
            return false;
        }
        self.records.insert(0, record);
        true
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// =============================================================================
// Source
// =============================================================================

/// Where a live feed gets its data from.
#[async_trait]
pub trait FeedSource: Send + Sync + 'static {
    /// Most recent records, newest first
    async fn load_recent(&self, limit: u32) -> Result<Vec<Record>>;

    /// Inserts from now on, plus a marker whenever some were missed
    async fn subscribe(&self) -> Result<RecordStream>;
}

/// In-process source: the record store plus the StreamHub insert topic.
#[derive(Clone)]
pub struct HubFeedSource {
    records: Arc<dyn BaseRecordStore>,
    hub: StreamHub,
}

impl HubFeedSource {
    pub fn new(records: Arc<dyn BaseRecordStore>, hub: StreamHub) -> Self {
        Self { records, hub }
    }

    pub fn from_deps(deps: &ServerDeps) -> Self {
        Self::new(deps.records.clone(), deps.stream_hub.clone())
    }
}

#[async_trait]
impl FeedSource for HubFeedSource {
    async fn load_recent(&self, limit: u32) -> Result<Vec<Record>> {
        self.records.recent(limit as i64).await
    }

    async fn subscribe(&self) -> Result<RecordStream> {
        let rx = self.hub.subscribe(FEED_TOPIC).await;
        let stream = BroadcastStream::new(rx).filter_map(|item| async move {
            match item {
                Ok(value) => Some(
                    serde_json::from_value::<FeedEvent>(value)
                        .map(|event| FeedUpdate::Inserted(event.into_record()))
                        .map_err(|e| anyhow!("malformed feed event: {}", e)),
                ),
                Err(BroadcastStreamRecvError::Lagged(n)) => Some(Ok(FeedUpdate::Lagged(n))),
            }
        });
        Ok(stream.boxed())
    }
}

// =============================================================================
// Live feed
// =============================================================================

/// Observable state of a [`LiveFeed`].
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    pub status: FeedStatus,
    pub items: FeedCollection,
    /// Most recent bulk-load, lag or stream failure
    pub last_error: Option<String>,
}

pub struct LiveFeed {
    state: Arc<watch::Sender<FeedState>>,
    task: Option<JoinHandle<()>>,
}

impl LiveFeed {
    /// Start loading and subscribing in the background.
    pub fn start(source: Arc<dyn FeedSource>) -> Self {
        let (tx, _rx) = watch::channel(FeedState::default());
        let state = Arc::new(tx);
        let task = tokio::spawn(run_feed(source, state.clone()));
        Self {
            state,
            task: Some(task),
        }
    }

    pub fn status(&self) -> FeedStatus {
        self.state.borrow().status
    }

    /// Copy of the records, newest first
    pub fn records(&self) -> Vec<Record> {
        self.state.borrow().items.records().to_vec()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }

    /// Watch state changes (status, records, errors).
    pub fn watch(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    /// Stop the background task and release the subscription.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state.send_modify(|s| s.status = FeedStatus::Closed);
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.close();
    }
}

fn set_status(state: &watch::Sender<FeedState>, status: FeedStatus) {
    state.send_if_modified(|s| {
        // Closed is terminal
        if s.status == FeedStatus::Closed || s.status == status {
            return false;
        }
        s.status = status;
        true
    });
}

async fn load_into(source: &dyn FeedSource, state: &watch::Sender<FeedState>) {
    match source.load_recent(FEED_PAGE_SIZE).await {
        Ok(records) => {
            debug!(count = records.len(), "Feed bulk load complete");
            state.send_modify(|s| s.items.seed(records));
        }
        Err(e) => {
            warn!(error = %e, "Feed bulk load failed");
            state.send_modify(|s| s.last_error = Some(format!("{:#}", e)));
        }
    }
}

async fn run_feed(source: Arc<dyn FeedSource>, state: Arc<watch::Sender<FeedState>>) {
    let bulk = load_into(source.as_ref(), &state);

    let live = async {
        let mut stream = match source.subscribe().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Feed subscription failed");
                state.send_modify(|s| s.last_error = Some(format!("{:#}", e)));
                set_status(&state, FeedStatus::Error);
                return;
            }
        };
        set_status(&state, FeedStatus::Subscribed);

        while let Some(item) = stream.next().await {
            match item {
                Ok(FeedUpdate::Inserted(record)) => {
                    let id = record.id;
                    state.send_if_modified(|s| s.items.merge(record));
                    debug!(record_id = %id, "Feed event merged");
                }
                Ok(FeedUpdate::Lagged(missed)) => {
                    warn!(missed, "Feed subscriber lagged, reloading recent records");
                    state.send_modify(|s| {
                        s.last_error = Some(format!("missed {} feed events", missed))
                    });
                    load_into(source.as_ref(), &state).await;
                }
                Err(e) => {
                    warn!(error = %e, "Feed stream error");
                    state.send_modify(|s| s.last_error = Some(format!("{:#}", e)));
                    set_status(&state, FeedStatus::Error);
                    return;
                }
            }
        }
        set_status(&state, FeedStatus::Closed);
    };

    tokio::join!(bulk, live);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::emoji::models::Visual;
    use crate::kernel::test_dependencies::InMemoryRecordStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn record(id: u128, minutes: i64) -> Record {
        Record {
            id: Uuid::from_u128(id),
            visual: Visual::Glyph("🙂".into()),
            description: format!("record {id}"),
            embedding: vec![],
            created_at: at(minutes),
        }
    }

    fn ids(records: &[Record]) -> Vec<u128> {
        records.iter().map(|r| r.id.as_u128()).collect()
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(FeedStatus::Subscribed).unwrap(),
            serde_json::json!("subscribed")
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut feed = FeedCollection::new();
        assert!(feed.merge(record(1, 0)));
        assert!(!feed.merge(record(1, 0)));
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn test_increasing_events_end_up_newest_first() {
        let mut feed = FeedCollection::new();
        for i in 0..5 {
            feed.merge(record(i, i as i64));
        }
        assert_eq!(ids(feed.records()), vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_seed_unions_with_streamed_records() {
        let mut feed = FeedCollection::new();
        // Arrived over the stream before the bulk load resolved
        feed.merge(record(3, 30));

        feed.seed(vec![record(3, 30), record(2, 20), record(1, 10)]);

        assert_eq!(ids(feed.records()), vec![3, 2, 1]);
        assert!(feed.contains(&Uuid::from_u128(2)));
    }

    /// Test source: bulk records plus an externally driven stream.
    struct ScriptedSource {
        recent: Result<Vec<Record>, String>,
        subscribe_error: Option<String>,
        loads: AtomicUsize,
        stream: Mutex<Option<mpsc::UnboundedReceiver<Result<FeedUpdate>>>>,
    }

    impl ScriptedSource {
        fn new(recent: Vec<Record>) -> (Self, mpsc::UnboundedSender<Result<FeedUpdate>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let source = Self {
                recent: Ok(recent),
                subscribe_error: None,
                loads: AtomicUsize::new(0),
                stream: Mutex::new(Some(rx)),
            };
            (source, tx)
        }
    }

    #[async_trait]
    impl FeedSource for ScriptedSource {
        async fn load_recent(&self, _limit: u32) -> Result<Vec<Record>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.recent.clone().map_err(|e| anyhow!(e))
        }

        async fn subscribe(&self) -> Result<RecordStream> {
            if let Some(e) = &self.subscribe_error {
                return Err(anyhow!("{}", e));
            }
            match self.stream.lock().unwrap().take() {
                Some(rx) => Ok(UnboundedReceiverStream::new(rx).boxed()),
                None => Ok(stream::empty().boxed()),
            }
        }
    }

    async fn wait_until(feed: &LiveFeed, f: impl Fn(&FeedState) -> bool) {
        let mut rx = feed.watch();
        rx.wait_for(|s| f(s)).await.unwrap();
    }

    #[tokio::test]
    async fn test_live_feed_seeds_and_merges() {
        let (source, tx) = ScriptedSource::new(vec![record(2, 20), record(1, 10)]);
        let feed = LiveFeed::start(Arc::new(source));

        wait_until(&feed, |s| s.status == FeedStatus::Subscribed && s.items.len() == 2).await;

        tx.send(Ok(FeedUpdate::Inserted(record(3, 30)))).unwrap();
        tx.send(Ok(FeedUpdate::Inserted(record(3, 30)))).unwrap();
        wait_until(&feed, |s| s.items.len() == 3).await;

        assert_eq!(ids(&feed.records()), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_stream_error_keeps_data() {
        let (source, tx) = ScriptedSource::new(vec![record(1, 10)]);
        let feed = LiveFeed::start(Arc::new(source));
        wait_until(&feed, |s| s.items.len() == 1).await;

        tx.send(Err(anyhow!("connection reset"))).unwrap();
        wait_until(&feed, |s| s.status == FeedStatus::Error).await;

        assert_eq!(ids(&feed.records()), vec![1]);
        assert!(feed.last_error().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_subscribe_failure_is_error_but_bulk_load_still_lands() {
        let (mut source, _tx) = ScriptedSource::new(vec![record(1, 10)]);
        source.subscribe_error = Some("refused".into());
        let feed = LiveFeed::start(Arc::new(source));

        wait_until(&feed, |s| s.status == FeedStatus::Error && s.items.len() == 1).await;
    }

    #[tokio::test]
    async fn test_bulk_load_failure_does_not_stop_stream() {
        let (mut source, tx) = ScriptedSource::new(vec![]);
        source.recent = Err("timeout".into());
        let feed = LiveFeed::start(Arc::new(source));

        wait_until(&feed, |s| s.last_error.is_some()).await;
        tx.send(Ok(FeedUpdate::Inserted(record(7, 70)))).unwrap();
        wait_until(&feed, |s| s.items.len() == 1).await;

        assert_eq!(feed.status(), FeedStatus::Subscribed);
    }

    #[tokio::test]
    async fn test_stream_end_closes() {
        let (source, tx) = ScriptedSource::new(vec![]);
        let feed = LiveFeed::start(Arc::new(source));
        wait_until(&feed, |s| s.status == FeedStatus::Subscribed).await;

        drop(tx);
        wait_until(&feed, |s| s.status == FeedStatus::Closed).await;
    }

    #[tokio::test]
    async fn test_close_releases_hub_subscription() {
        let hub = StreamHub::new();
        let store: Arc<dyn BaseRecordStore> = Arc::new(InMemoryRecordStore::new(2));
        let source = HubFeedSource::new(store, hub.clone());

        let mut feed = LiveFeed::start(Arc::new(source));
        wait_until(&feed, |s| s.status == FeedStatus::Subscribed).await;
        assert_eq!(hub.subscriber_count(FEED_TOPIC).await, 1);

        feed.close();
        assert_eq!(feed.status(), FeedStatus::Closed);

        // The aborted task drops its receiver on the runtime's next turn
        for _ in 0..100 {
            if hub.subscriber_count(FEED_TOPIC).await == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(hub.subscriber_count(FEED_TOPIC).await, 0);
    }

    #[tokio::test]
    async fn test_hub_source_delivers_published_records() {
        let hub = StreamHub::new();
        let store: Arc<dyn BaseRecordStore> = Arc::new(InMemoryRecordStore::new(2));
        let feed = LiveFeed::start(Arc::new(HubFeedSource::new(store, hub.clone())));
        wait_until(&feed, |s| s.status == FeedStatus::Subscribed).await;

        let event = FeedEvent::RecordInserted {
            record: record(9, 90),
        };
        hub.publish_serialized(FEED_TOPIC, &event).await.unwrap();
        hub.publish_serialized(FEED_TOPIC, &event).await.unwrap();

        wait_until(&feed, |s| s.items.len() == 1).await;
        assert_eq!(ids(&feed.records()), vec![9]);
    }

    #[tokio::test]
    async fn test_lag_reloads_recent_page() {
        let (source, tx) = ScriptedSource::new(vec![record(2, 20), record(1, 10)]);
        let source = Arc::new(source);
        let feed = LiveFeed::start(source.clone());
        wait_until(&feed, |s| s.status == FeedStatus::Subscribed && s.items.len() == 2).await;

        tx.send(Ok(FeedUpdate::Lagged(3))).unwrap();
        wait_until(&feed, |s| s.last_error.is_some()).await;
        tx.send(Ok(FeedUpdate::Inserted(record(3, 30)))).unwrap();
        wait_until(&feed, |s| s.items.len() == 3).await;

        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
        assert_eq!(feed.status(), FeedStatus::Subscribed);
        assert!(feed.last_error().unwrap().contains("missed 3"));
        assert_eq!(ids(&feed.records()), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_hub_source_reports_lag() {
        let hub = StreamHub::with_capacity(2);
        let store: Arc<dyn BaseRecordStore> = Arc::new(InMemoryRecordStore::new(2));
        let source = HubFeedSource::new(store, hub.clone());
        let mut stream = source.subscribe().await.unwrap();

        for i in 0..5 {
            let event = FeedEvent::RecordInserted { record: record(i, i as i64) };
            hub.publish_serialized(FEED_TOPIC, &event).await.unwrap();
        }

        assert_eq!(stream.next().await.unwrap().unwrap(), FeedUpdate::Lagged(3));
        match stream.next().await.unwrap().unwrap() {
            FeedUpdate::Inserted(r) => assert_eq!(r.id.as_u128(), 3),
            other => panic!("expected insert, got {:?}", other),
        }
    }
}
