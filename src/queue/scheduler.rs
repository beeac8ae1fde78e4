use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
    PoisonError,
};

use super::types::{
    FetchQueueItem,
    QueueOrder,
    SchedulerConfig,
};
use crate::{
    api::ApiClient,
    cache::CacheStore,
    core::{
        CardDataItem,
        CardStatRecord,
        DataSource,
        FetchError,
        ParseType,
        StatPayload,
    },
    sources::{
        AdapterRegistry,
        FetchRequest,
        SourceAdapter,
    },
    websocket::{
        Broadcast,
        Broadcaster,
    },
};

#[derive(Default)]
struct QueueState {
    items: Vec<FetchQueueItem>,
    processing: bool,
}

struct Inner {
    state: Mutex<QueueState>,
    adapters: AdapterRegistry,
    cache: CacheStore,
    broadcaster: Broadcaster,
    api: Option<ApiClient>,
    config: SchedulerConfig,
}

/// Paced, single-flight fetch queue.
///
/// One worker task drains the queue while it is non-empty and exits when it runs
/// dry; the next `enqueue` starts a new one. At most one adapter call is in flight
/// at any time.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Outcome {
    item: CardDataItem,
    /// False when the item was answered without an adapter call.
    network: bool,
}

impl Scheduler {
    pub fn new(
        adapters: AdapterRegistry,
        cache: CacheStore,
        broadcaster: Broadcaster,
        config: SchedulerConfig,
    ) -> Self {
        Self::build(adapters, cache, broadcaster, None, config)
    }

    pub fn with_api(
        adapters: AdapterRegistry,
        cache: CacheStore,
        broadcaster: Broadcaster,
        api: ApiClient,
        config: SchedulerConfig,
    ) -> Self {
        Self::build(adapters, cache, broadcaster, Some(api), config)
    }

    fn build(
        adapters: AdapterRegistry,
        cache: CacheStore,
        broadcaster: Broadcaster,
        api: Option<ApiClient>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                adapters,
                cache,
                broadcaster,
                api,
                config,
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues requests and starts the worker if it is idle. A request whose key
    /// is already queued replaces the older entry. Must be called from within a
    /// tokio runtime.
    pub fn enqueue(&self, requests: impl IntoIterator<Item = FetchRequest>) -> usize {
        let mut added = 0;
        let start_worker = {
            let mut state = self.state();
            for request in requests {
                let key = request.key();
                state.items.retain(|queued| queued.request.key() != key);
                state.items.push(FetchQueueItem::new(request));
                added += 1;
            }

            let start = !state.processing && !state.items.is_empty();
            if start {
                state.processing = true;
            }
            start
        };

        if start_worker {
            let scheduler = self.clone();
            tokio::spawn(async move { scheduler.drain().await });
        }

        tracing::debug!("Queued {} card requests, queue size {}", added, self.len());
        added
    }

    /// Drops everything still queued and tells every tab once. A request already
    /// in flight finishes normally.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut state = self.state();
            let removed = state.items.len();
            state.items.clear();
            removed
        };

        self.inner.broadcaster.broadcast(&Broadcast::CardDataQueueCleared);
        tracing::info!("Card data queue cleared, {} pending requests dropped", removed);
        removed
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_item(&self) -> Option<FetchQueueItem> {
        let mut state = self.state();
        let item = match self.inner.config.order {
            QueueOrder::Lifo => state.items.pop(),
            QueueOrder::Fifo if state.items.is_empty() => None,
            QueueOrder::Fifo => Some(state.items.remove(0)),
        };
        if item.is_none() {
            state.processing = false;
        }
        item
    }

    async fn drain(self) {
        let _guard = WorkerGuard { scheduler: &self };
        while let Some(item) = self.next_item() {
            let outcome = self.process(&item.request).await;
            self.inner.broadcaster.broadcast(&Broadcast::CardDataUpdated { items: vec![outcome.item] });

            if outcome.network {
                tokio::time::sleep(self.inner.config.request_delay).await;
            }
        }
        tracing::debug!("Card data queue drained");
    }

    async fn process(&self, request: &FetchRequest) -> Outcome {
        let username = request.username.as_deref();

        if !request.parse_type.is_site_data() {
            match self.inner.cache.get(&request.card_id, request.parse_type, username).await {
                Ok(Some(record)) => {
                    tracing::debug!("Cache hit for {} {}", request.parse_type, request.card_id);
                    return Outcome { item: CardDataItem::Record(record), network: false };
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Cache read failed for {}: {}", request.card_id, e),
            }
        }

        let Some(adapter) = self.inner.adapters.get(request.parse_type) else {
            let error = FetchError::Unsupported(request.parse_type.to_string());
            return Outcome { item: error_item(request, &error), network: false };
        };

        let mut result = self.fetch_with_timeout(adapter.as_ref(), request).await;
        if matches!(&result, Err(e) if e.is_retryable()) {
            tracing::debug!("Retrying {} {} after 403", request.parse_type, request.card_id);
            tokio::time::sleep(self.inner.config.request_delay).await;
            result = self.fetch_with_timeout(adapter.as_ref(), request).await;
        }

        let item = match result {
            Ok(payload) => {
                let record = CardStatRecord::new(
                    request.card_id.clone(),
                    request.parse_type,
                    request.username.clone(),
                    payload,
                    adapter.source(),
                );
                if let Err(e) = self.inner.cache.set(&record).await {
                    tracing::warn!("Failed to cache {} {}: {}", record.parse_type, record.card_id, e);
                }
                self.submit_scraped(&record);
                CardDataItem::Record(record)
            }
            Err(e) => {
                tracing::warn!("Fetching {} for card {} failed: {}", request.parse_type, request.card_id, e);
                error_item(request, &e)
            }
        };

        Outcome { item, network: true }
    }

    async fn fetch_with_timeout(
        &self,
        adapter: &dyn SourceAdapter,
        request: &FetchRequest,
    ) -> Result<StatPayload, FetchError> {
        let timeout = self.inner.config.fetch_timeout;
        match tokio::time::timeout(timeout, adapter.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout.as_millis() as u64)),
        }
    }

    fn submit_scraped(&self, record: &CardStatRecord) {
        if !self.inner.config.submit_scraped_stats
            || record.source != DataSource::Html
            || !matches!(record.parse_type, ParseType::Counts | ParseType::Unlocked)
        {
            return;
        }
        let Some(api) = self.inner.api.clone() else {
            return;
        };

        let record = record.clone();
        tokio::spawn(async move {
            if api.tokens().get_token().await.is_none() {
                return;
            }
            if let Err(e) = api.submit_card_stats(&record).await {
                tracing::warn!("Failed to submit stats for card {}: {}", record.card_id, e);
            }
        });
    }
}

/// Marks the worker idle if it unwinds, so the next `enqueue` starts a new one.
struct WorkerGuard<'a> {
    scheduler: &'a Scheduler,
}

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut state = self.scheduler.state();
            state.processing = false;
            tracing::error!("Card data worker panicked, {} requests left queued", state.items.len());
        }
    }
}

fn error_item(request: &FetchRequest, error: &FetchError) -> CardDataItem {
    CardDataItem::Error {
        card_id: request.card_id.clone(),
        parse_type: request.parse_type,
        username: request.username.clone(),
        error: error.to_string(),
    }
}
