//! Search-as-you-type debouncing with last-query-wins delivery.
//!
//! At most one pending task exists at a time. A new input aborts it, whether
//! it is still waiting out the delay or already searching, and a generation
//! counter keeps any result that slips through from being published.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::domains::emoji::actions::{search_records, SearchParams, SearchResponse};
use crate::domains::emoji::errors::EmojiResult;
use crate::kernel::ServerDeps;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

type SearchFn<T> = Arc<dyn Fn(String) -> BoxFuture<'static, T> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome<T> {
    /// No query, or the query was cleared
    Empty,
    Ready { query: String, result: T },
}

pub struct SearchDebouncer<T> {
    delay: Duration,
    search: SearchFn<T>,
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    outcome: Arc<watch::Sender<SearchOutcome<T>>>,
}

impl<T: Send + Sync + 'static> SearchDebouncer<T> {
    pub fn new<F, Fut>(search: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (tx, _rx) = watch::channel(SearchOutcome::Empty);
        Self {
            delay: DEFAULT_DEBOUNCE,
            search: Arc::new(move |q| search(q).boxed()),
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
            outcome: Arc::new(tx),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Feed the latest input text.
    pub fn input(&mut self, text: &str) {
        self.cancel_pending();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let query = text.trim().to_string();
        if query.is_empty() {
            self.outcome.send_replace(SearchOutcome::Empty);
            return;
        }

        let delay = self.delay;
        let search = self.search.clone();
        let latest = self.generation.clone();
        let outcome = self.outcome.clone();

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(query = %query, generation, "Debounced search firing");

            let result = search(query.clone()).await;
            if latest.load(Ordering::SeqCst) == generation {
                outcome.send_replace(SearchOutcome::Ready { query, result });
            }
        }));
    }

    /// Drop any pending or in-flight search and publish an empty outcome.
    pub fn clear(&mut self) {
        self.cancel_pending();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.outcome.send_replace(SearchOutcome::Empty);
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchOutcome<T>> {
        self.outcome.subscribe()
    }

    fn cancel_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl<T> Drop for SearchDebouncer<T> {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

/// Debouncer running the search pipeline with default limit and threshold.
pub fn search_debouncer(deps: ServerDeps) -> SearchDebouncer<EmojiResult<SearchResponse>> {
    SearchDebouncer::new(move |query| {
        let deps = deps.clone();
        async move {
            let params = SearchParams {
                q: Some(query),
                ..Default::default()
            };
            search_records(params, &deps).await
        }
    })
}
