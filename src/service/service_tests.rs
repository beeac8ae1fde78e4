#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::{
        cache::{
            CacheStore,
            TtlPolicy,
        },
        core::{
            CardDataItem,
            CardId,
            CardStatRecord,
            Counts,
            DataSource,
            FetchError,
            ParseType,
            StatPayload,
        },
        persistence::MemoryStore,
        queue::{
            Scheduler,
            SchedulerConfig,
        },
        service::CardDataService,
        sources::{
            AdapterRegistry,
            FetchRequest,
            SourceAdapter,
        },
        websocket::{
            Broadcast,
            Broadcaster,
            ClientMessage,
            ServiceResponse,
        },
        widgets::{
            CardElement,
            RendererConfig,
            TemplateItem,
            TriggerEvent,
            Widget,
            WidgetRenderer,
        },
    };

    const ORIGIN: &str = "https://animestars.org";

    #[derive(Default)]
    struct FakeAdapter {
        calls: Mutex<Vec<FetchRequest>>,
    }

    #[async_trait]
    impl SourceAdapter for FakeAdapter {
        fn source(&self) -> DataSource {
            DataSource::Html
        }

        async fn fetch(&self, request: &FetchRequest) -> Result<StatPayload, FetchError> {
            self.calls.lock().unwrap().push(request.clone());
            match request.parse_type {
                ParseType::Counts => Ok(StatPayload::Counts(Counts { trade: 46, need: 14, owner: 642 })),
                ParseType::Duplicates => Ok(StatPayload::Duplicates { duplicates: 2 }),
                _ => Err(FetchError::Unsupported(request.parse_type.to_string())),
            }
        }
    }

    struct Harness {
        service: CardDataService,
        adapter: Arc<FakeAdapter>,
        tab: mpsc::Receiver<String>,
    }

    fn harness() -> Harness {
        let adapter = Arc::new(FakeAdapter::default());
        let registry = AdapterRegistry::new()
            .with(ParseType::Counts, adapter.clone())
            .with(ParseType::Duplicates, adapter.clone());

        let cache = CacheStore::new(Arc::new(MemoryStore::new()), TtlPolicy::default());
        let broadcaster = Broadcaster::new();
        let (_, tab) = broadcaster.register();
        let config = SchedulerConfig { request_delay: Duration::from_millis(10), ..SchedulerConfig::default() };
        let scheduler = Scheduler::new(registry, cache.clone(), broadcaster.clone(), config);

        Harness { service: CardDataService::new(cache, scheduler, broadcaster, None), adapter, tab }
    }

    async fn next_broadcast(tab: &mut mpsc::Receiver<String>) -> Broadcast {
        let json = tokio::time::timeout(Duration::from_secs(3), tab.recv())
            .await
            .expect("timed out waiting for broadcast")
            .expect("broadcaster dropped");
        serde_json::from_str(&json).unwrap()
    }

    #[tokio::test]
    async fn test_hover_to_rendered_counts() {
        let mut h = harness();
        let renderer = WidgetRenderer::new(RendererConfig::new(
            ORIGIN,
            vec![Widget {
                id: "w1".into(),
                template_items: vec![
                    TemplateItem::variable("need"),
                    TemplateItem::text("|"),
                    TemplateItem::variable("owner"),
                    TemplateItem::text("|"),
                    TemplateItem::variable("trade"),
                ],
                ..Widget::default()
            }],
        ));
        let mut cards = vec![CardElement::new(CardId::from(4779))];

        let message = renderer.handle_event(&mut cards[0], TriggerEvent::MouseOver).unwrap();
        assert_eq!(h.service.handle(message).await, ServiceResponse::Queued { queued: 1 });

        let broadcast = next_broadcast(&mut h.tab).await;
        renderer.handle_broadcast(&mut cards, &broadcast);
        assert_eq!(cards[0].node("w1").unwrap().inner_html, "14|642|46");

        let cached = h.service.cache().get(&CardId::from(4779), ParseType::Counts, None).await.unwrap().unwrap();
        assert_eq!(cached.data, StatPayload::Counts(Counts { trade: 46, need: 14, owner: 642 }));
        assert_eq!(cached.source, DataSource::Html);
    }

    #[tokio::test]
    async fn test_cached_data_is_broadcast() {
        let mut h = harness();
        let record = CardStatRecord::new(
            CardId::from(10),
            ParseType::Counts,
            None,
            StatPayload::Counts(Counts { trade: 1, need: 2, owner: 3 }),
            DataSource::Html,
        );
        h.service.cache().set(&record).await.unwrap();

        let response = h
            .service
            .handle(ClientMessage::FetchCachedCardData {
                card_ids: vec![CardId::from(10), CardId::from(11)],
                parse_types: vec![ParseType::Counts, ParseType::SiteCard],
                username: None,
            })
            .await;
        assert_eq!(response, ServiceResponse::Found { found: 1 });

        match next_broadcast(&mut h.tab).await {
            Broadcast::CardDataUpdated { items } => {
                assert_eq!(items.len(), 1);
                let CardDataItem::Record(cached) = &items[0] else {
                    panic!("Expected a record");
                };
                assert_eq!(cached.card_id, record.card_id);
                assert_eq!(cached.data, record.data);
            }
            other => panic!("Expected card_data_updated, got {:?}", other),
        }
        assert!(h.adapter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cache_miss_sends_nothing() {
        let mut h = harness();
        let response = h
            .service
            .handle(ClientMessage::FetchCachedCardData {
                card_ids: vec![CardId::from(99)],
                parse_types: vec![ParseType::Counts],
                username: None,
            })
            .await;
        assert_eq!(response, ServiceResponse::Found { found: 0 });
        assert!(tokio::time::timeout(Duration::from_millis(100), h.tab.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicates_without_username_are_skipped() {
        let mut h = harness();
        let response = h
            .service
            .handle(ClientMessage::FetchCardDataQueue {
                card_ids: vec![CardId::from(1), CardId::new(" ")],
                origin: ORIGIN.into(),
                parse_types: vec![ParseType::Duplicates, ParseType::Counts],
                username: None,
            })
            .await;
        assert_eq!(response, ServiceResponse::Queued { queued: 1 });

        next_broadcast(&mut h.tab).await;
        let calls = h.adapter.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].parse_type, ParseType::Counts);
    }

    #[tokio::test]
    async fn test_queue_and_cache_management() {
        let mut h = harness();

        assert_eq!(
            h.service.handle(ClientMessage::GetCardDataQueueSize).await,
            ServiceResponse::QueueSize { size: 0 }
        );
        assert_eq!(
            h.service.handle(ClientMessage::ClearCardDataQueue).await,
            ServiceResponse::Success { success: true }
        );
        assert_eq!(next_broadcast(&mut h.tab).await, Broadcast::CardDataQueueCleared);

        let record = CardStatRecord::new(
            CardId::from(5),
            ParseType::Counts,
            None,
            StatPayload::Counts(Counts::default()),
            DataSource::Html,
        );
        h.service.cache().set(&record).await.unwrap();

        match h.service.handle(ClientMessage::GetCardCacheStats).await {
            ServiceResponse::CacheStats(stats) => assert_eq!(stats.html.count, 1),
            other => panic!("Expected cache stats, got {:?}", other),
        }
        assert_eq!(
            h.service.handle(ClientMessage::ClearAllCardCaches).await,
            ServiceResponse::CacheCleared { cleared: true, removed: 1 }
        );
        assert!(h.service.cache().get(&CardId::from(5), ParseType::Counts, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_api_connection_without_client() {
        let h = harness();
        assert_eq!(
            h.service.handle(ClientMessage::TestApiConnection).await,
            ServiceResponse::ApiConnection { success: false, authenticated: false }
        );
    }
}
