//! Request handling for everything a tab can ask of the background service.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::{
    api::ApiClient,
    cache::CacheStore,
    core::{
        CardDataItem,
        CardId,
        FetchError,
        ParseType,
    },
    queue::Scheduler,
    sources::FetchRequest,
    websocket::{
        Broadcast,
        Broadcaster,
        ClientMessage,
        ServiceResponse,
    },
};

#[derive(Clone)]
pub struct CardDataService {
    cache: CacheStore,
    scheduler: Scheduler,
    broadcaster: Broadcaster,
    api: Option<ApiClient>,
}

impl CardDataService {
    pub fn new(cache: CacheStore, scheduler: Scheduler, broadcaster: Broadcaster, api: Option<ApiClient>) -> Self {
        Self { cache, scheduler, broadcaster, api }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub async fn handle(&self, message: ClientMessage) -> ServiceResponse {
        match message {
            ClientMessage::FetchCardDataQueue { card_ids, origin, parse_types, username } => {
                let queued = self.fetch_queue(&card_ids, &origin, &parse_types, username);
                ServiceResponse::Queued { queued }
            }
            ClientMessage::FetchCachedCardData { card_ids, parse_types, username } => {
                let found = self.fetch_cached(&card_ids, &parse_types, username.as_deref()).await;
                ServiceResponse::Found { found }
            }
            ClientMessage::ClearCardDataQueue => {
                self.scheduler.clear();
                ServiceResponse::Success { success: true }
            }
            ClientMessage::GetCardDataQueueSize => ServiceResponse::QueueSize { size: self.scheduler.len() },
            ClientMessage::ClearAllCardCaches => match self.cache.clear_all().await {
                Ok(result) => {
                    tracing::info!("Cleared {} cached card entries", result.removed_count);
                    ServiceResponse::CacheCleared { cleared: result.cleared, removed: result.removed_count }
                }
                Err(e) => {
                    tracing::error!("Failed to clear card caches: {}", e);
                    ServiceResponse::Error { error: e.to_string() }
                }
            },
            ClientMessage::GetCardCacheStats => match self.cache.stats().await {
                Ok(stats) => ServiceResponse::CacheStats(stats),
                Err(e) => ServiceResponse::Error { error: e.to_string() },
            },
            ClientMessage::TestApiConnection => self.test_api_connection().await,
        }
    }

    fn fetch_queue(
        &self,
        card_ids: &[CardId],
        origin: &str,
        parse_types: &[ParseType],
        username: Option<String>,
    ) -> usize {
        let mut requests = Vec::new();
        for card_id in card_ids.iter().filter(|id| !id.is_empty()) {
            for &parse_type in parse_types {
                let request = FetchRequest::new(card_id.clone(), origin, parse_type, username.clone());
                if parse_type.requires_username() && request.username.is_none() {
                    tracing::warn!("Skipping {} for card {}: no username", parse_type, card_id);
                    continue;
                }
                requests.push(request);
            }
        }

        if requests.is_empty() {
            return 0;
        }
        self.scheduler.enqueue(requests)
    }

    async fn fetch_cached(&self, card_ids: &[CardId], parse_types: &[ParseType], username: Option<&str>) -> usize {
        let records = match self.cache.get_bulk(card_ids, parse_types, username).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Bulk cache read failed: {}", e);
                return 0;
            }
        };

        let found = records.len();
        if found > 0 {
            let items = records.into_iter().map(CardDataItem::Record).collect();
            self.broadcaster.broadcast(&Broadcast::CardDataUpdated { items });
        }
        found
    }

    async fn test_api_connection(&self) -> ServiceResponse {
        let Some(api) = &self.api else {
            return ServiceResponse::ApiConnection { success: false, authenticated: false };
        };

        match api.current_user().await {
            Ok(user) => {
                tracing::info!("Stats API reachable, signed in as {}", user.username);
                ServiceResponse::ApiConnection { success: true, authenticated: true }
            }
            Err(FetchError::Auth) => ServiceResponse::ApiConnection { success: true, authenticated: false },
            Err(e) => {
                tracing::warn!("Stats API connection test failed: {}", e);
                ServiceResponse::ApiConnection { success: e.status().is_some(), authenticated: false }
            }
        }
    }

    /// Periodically drops cache entries past their TTL.
    pub fn spawn_cache_cleanup(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.cache.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.cleanup_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!("Removed {} expired cache entries", removed),
                    Err(e) => tracing::warn!("Cache cleanup failed: {}", e),
                }
            }
        })
    }
}

mod service_tests;
