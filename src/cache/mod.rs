pub mod policy;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

pub use policy::{
    cache_key,
    is_cacheable,
    TtlPolicy,
    CACHE_NAMESPACE,
    CACHE_VERSION,
};
use crate::{
    core::{
        models::scoped_username,
        utils::now_millis,
        CardId,
        CardStatRecord,
        CardStatsError,
        DataSource,
        ParseType,
    },
    persistence::KeyValueStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResult {
    pub cleared: bool,
    pub removed_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStats {
    pub count: usize,
    pub valid_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub api: SourceStats,
    pub html: SourceStats,
    /// Entries under the namespace that could not be decoded or belong to an
    /// older schema version.
    pub stale_schema: usize,
}

/// Card statistics cache over a shared key/value store.
///
/// Site-data parse types never reach the store: `set` refuses them and both read
/// paths skip them, using [`is_cacheable`] in every case.
#[derive(Clone)]
pub struct CacheStore {
    store: Arc<dyn KeyValueStore>,
    policy: TtlPolicy,
    enabled: bool,
}

impl CacheStore {
    pub fn new(store: Arc<dyn KeyValueStore>, policy: TtlPolicy) -> Self {
        Self { store, policy, enabled: true }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn policy(&self) -> TtlPolicy {
        self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn get(
        &self,
        card_id: &CardId,
        parse_type: ParseType,
        username: Option<&str>,
    ) -> Result<Option<CardStatRecord>, CardStatsError> {
        if !self.enabled || !is_cacheable(parse_type) {
            return Ok(None);
        }
        if parse_type.requires_username() && username.is_none() {
            return Ok(None);
        }

        let key = cache_key(card_id, parse_type, username);
        let Some(value) = self.store.get(&key).await? else {
            return Ok(None);
        };

        Ok(self.decode_fresh(&key, value, now_millis()))
    }

    pub async fn get_bulk(
        &self,
        card_ids: &[CardId],
        parse_types: &[ParseType],
        username: Option<&str>,
    ) -> Result<Vec<CardStatRecord>, CardStatsError> {
        if !self.enabled {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = card_ids
            .iter()
            .flat_map(move |card_id| {
                parse_types
                    .iter()
                    .filter(|pt| is_cacheable(**pt))
                    .filter(move |pt| !pt.requires_username() || username.is_some())
                    .map(move |pt| cache_key(card_id, *pt, username))
            })
            .collect();

        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut stored = self.store.get_many(&keys).await?;
        let now = now_millis();

        // Preserve request order rather than map order.
        let records: Vec<CardStatRecord> = keys
            .iter()
            .filter_map(|key| stored.remove(key).and_then(|value| self.decode_fresh(key, value, now)))
            .collect();

        tracing::debug!("Bulk cache lookup: {}/{} hits", records.len(), keys.len());
        Ok(records)
    }

    /// Stores a record stamped with the current time. Returns `false` when the
    /// record is not cacheable or caching is disabled.
    pub async fn set(&self, record: &CardStatRecord) -> Result<bool, CardStatsError> {
        if !self.enabled || !is_cacheable(record.parse_type) || record.source == DataSource::Site {
            return Ok(false);
        }
        if !record.data.fits(record.parse_type) {
            tracing::warn!(
                "Refusing to cache {} record for card {} with mismatched payload",
                record.parse_type,
                record.card_id
            );
            return Ok(false);
        }

        let username = scoped_username(record.parse_type, record.username.clone());
        if record.parse_type.requires_username() && username.is_none() {
            return Ok(false);
        }

        let mut stamped = record.clone();
        stamped.username = username;
        stamped.timestamp = now_millis();

        let key = cache_key(&stamped.card_id, stamped.parse_type, stamped.username.as_deref());
        self.store.set(&key, serde_json::to_value(&stamped)?).await?;
        tracing::debug!("Cached {} for card {} from {:?}", stamped.parse_type, stamped.card_id, stamped.source);
        Ok(true)
    }

    pub async fn clear_all(&self) -> Result<ClearResult, CardStatsError> {
        let keys = self.store.keys_with_prefix(CACHE_NAMESPACE).await?;
        let removed_count = self.store.remove(&keys).await?;
        tracing::info!("Cleared card cache ({} entries)", removed_count);
        Ok(ClearResult { cleared: true, removed_count })
    }

    pub async fn stats(&self) -> Result<CacheStats, CardStatsError> {
        let entries = self.store.entries_with_prefix(CACHE_NAMESPACE).await?;
        let current = policy::current_prefix();
        let now = now_millis();
        let mut stats = CacheStats::default();

        for (key, value) in entries {
            let record = if key.starts_with(&current) {
                serde_json::from_value::<CardStatRecord>(value).ok()
            } else {
                None
            };
            let Some(record) = record else {
                stats.stale_schema += 1;
                continue;
            };

            let bucket = match record.source {
                DataSource::Api => &mut stats.api,
                DataSource::Html => &mut stats.html,
                DataSource::Site => continue,
            };
            bucket.count += 1;
            if self.policy.is_fresh(&record, now) {
                bucket.valid_count += 1;
            }
        }

        Ok(stats)
    }

    /// Removes expired, undecodable and old-version entries.
    pub async fn cleanup_expired(&self) -> Result<usize, CardStatsError> {
        let entries = self.store.entries_with_prefix(CACHE_NAMESPACE).await?;
        let current = policy::current_prefix();
        let now = now_millis();

        let expired: Vec<String> = entries
            .into_iter()
            .filter(|(key, value)| {
                !key.starts_with(&current)
                    || serde_json::from_value::<CardStatRecord>(value.clone())
                        .map(|record| !self.policy.is_fresh(&record, now))
                        .unwrap_or(true)
            })
            .map(|(key, _)| key)
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }

        let removed = self.store.remove(&expired).await?;
        tracing::info!("Card cache cleanup: removed {} expired entries", removed);
        Ok(removed)
    }

    fn decode_fresh(&self, key: &str, value: Value, now: i64) -> Option<CardStatRecord> {
        match serde_json::from_value::<CardStatRecord>(value) {
            Ok(record) if self.policy.is_fresh(&record, now) => Some(record),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Ignoring malformed cache entry {}: {}", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{
        core::{
            Counts,
            DeckCounts,
            StatPayload,
        },
        persistence::MemoryStore,
    };

    fn counts_record(card_id: u64, need: u32) -> CardStatRecord {
        CardStatRecord::new(
            CardId::from(card_id),
            ParseType::Counts,
            None,
            StatPayload::Counts(Counts { trade: 1, need, owner: 2 }),
            DataSource::Html,
        )
    }

    fn cache_with(policy: TtlPolicy) -> (CacheStore, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (CacheStore::new(store.clone(), policy), store)
    }

    #[tokio::test]
    async fn test_set_then_get_returns_same_payload() {
        let (cache, _) = cache_with(TtlPolicy::default());
        let record = counts_record(4779, 14);

        assert!(cache.set(&record).await.unwrap());
        let cached = cache.get(&record.card_id, ParseType::Counts, None).await.unwrap().unwrap();
        assert_eq!(cached.data, record.data);
        assert_eq!(cached.source, DataSource::Html);
    }

    #[tokio::test]
    async fn test_get_after_ttl_returns_none() {
        let short = Duration::from_millis(40);
        let (cache, _) = cache_with(TtlPolicy { api: short, html: short });
        let record = counts_record(1, 3);
        cache.set(&record).await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get(&record.card_id, ParseType::Counts, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_key_overwrites() {
        let (cache, store) = cache_with(TtlPolicy::default());
        cache.set(&counts_record(5, 1)).await.unwrap();
        cache.set(&counts_record(5, 9)).await.unwrap();

        assert_eq!(store.len().await, 1);
        let cached = cache.get(&CardId::from(5), ParseType::Counts, None).await.unwrap().unwrap();
        assert_eq!(cached.data, StatPayload::Counts(Counts { trade: 1, need: 9, owner: 2 }));
    }

    #[tokio::test]
    async fn test_site_data_never_cached() {
        let (cache, store) = cache_with(TtlPolicy::default());
        let deck = CardStatRecord::new(
            CardId::from(7),
            ParseType::SiteDeck,
            None,
            StatPayload::SiteDeck(DeckCounts::default()),
            DataSource::Html,
        );
        assert!(!cache.set(&deck).await.unwrap());
        assert_eq!(store.len().await, 0);

        // Even if something wrote a site entry under the namespace, reads skip it.
        store
            .set(&cache_key(&deck.card_id, ParseType::SiteDeck, None), serde_json::to_value(&deck).unwrap())
            .await
            .unwrap();
        cache.set(&counts_record(7, 1)).await.unwrap();

        let bulk = cache
            .get_bulk(&[CardId::from(7)], &[ParseType::Counts, ParseType::SiteDeck, ParseType::SiteCard], None)
            .await
            .unwrap();
        assert_eq!(bulk.len(), 1);
        assert!(bulk.iter().all(|r| !r.parse_type.is_site_data()));
        assert!(cache.get(&deck.card_id, ParseType::SiteDeck, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicates_scoped_by_username() {
        let (cache, _) = cache_with(TtlPolicy::default());
        let record = CardStatRecord::new(
            CardId::from(3),
            ParseType::Duplicates,
            Some("alice".into()),
            StatPayload::Duplicates { duplicates: 2 },
            DataSource::Html,
        );
        assert!(cache.set(&record).await.unwrap());

        let id = CardId::from(3);
        assert!(cache.get(&id, ParseType::Duplicates, Some("alice")).await.unwrap().is_some());
        assert!(cache.get(&id, ParseType::Duplicates, Some("bob")).await.unwrap().is_none());
        assert!(cache.get(&id, ParseType::Duplicates, None).await.unwrap().is_none());

        let bulk = cache.get_bulk(&[id.clone()], &[ParseType::Duplicates], None).await.unwrap();
        assert!(bulk.is_empty());
        let bulk = cache.get_bulk(&[id], &[ParseType::Duplicates], Some("alice")).await.unwrap();
        assert_eq!(bulk.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_entry_is_a_miss() {
        let (cache, store) = cache_with(TtlPolicy::default());
        let id = CardId::from(9);
        store.set(&cache_key(&id, ParseType::Counts, None), json!({"garbage": true})).await.unwrap();

        assert!(cache.get(&id, ParseType::Counts, None).await.unwrap().is_none());
        assert!(cache.get_bulk(&[id], &[ParseType::Counts], None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_removes_every_version() {
        let (cache, store) = cache_with(TtlPolicy::default());
        cache.set(&counts_record(1, 1)).await.unwrap();
        cache.set(&counts_record(2, 1)).await.unwrap();
        store.set("card_stats_v2:counts:1", json!({"old": 1})).await.unwrap();
        store.set("ass_api_token", json!("keep me")).await.unwrap();

        let result = cache.clear_all().await.unwrap();
        assert_eq!(result, ClearResult { cleared: true, removed_count: 3 });
        assert_eq!(store.get("ass_api_token").await.unwrap(), Some(json!("keep me")));
    }

    #[tokio::test]
    async fn test_disabled_cache_reads_and_writes_nothing() {
        let (cache, store) = cache_with(TtlPolicy::default());
        let cache = cache.with_enabled(false);
        assert!(!cache.set(&counts_record(1, 1)).await.unwrap());
        assert_eq!(store.len().await, 0);
        assert!(cache.get_bulk(&[CardId::from(1)], &[ParseType::Counts], None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats_and_cleanup() {
        let short = Duration::from_millis(30);
        let (cache, store) = cache_with(TtlPolicy { api: Duration::from_secs(60), html: short });
        cache.set(&counts_record(1, 1)).await.unwrap();
        let mut api = counts_record(2, 1);
        api.source = DataSource::Api;
        cache.set(&api).await.unwrap();
        store.set("card_stats_v2:counts:1", json!({"old": 1})).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.html, SourceStats { count: 1, valid_count: 0 });
        assert_eq!(stats.api, SourceStats { count: 1, valid_count: 1 });
        assert_eq!(stats.stale_schema, 1);

        assert_eq!(cache.cleanup_expired().await.unwrap(), 2);
        assert_eq!(store.len().await, 1);
    }
}
