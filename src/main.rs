use std::sync::Arc;

use cardstats::{
    api::{
        ApiClient,
        TokenStore,
    },
    cache::CacheStore,
    core::http::site_client,
    persistence::{
        get_data_file_path,
        JsonFileStore,
        CACHE_FILE,
        CREDENTIALS_FILE,
    },
    queue::Scheduler,
    sources::{
        AdapterRegistry,
        HtmlAdapter,
    },
    websocket::{
        Broadcaster,
        WebSocketServer,
    },
    CardDataService,
    CardStatsError,
    Settings,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), CardStatsError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cardstats=info")))
        .init();

    let settings = Settings::load();
    let addr = settings
        .listen_addr()
        .map_err(|e| CardStatsError::Custom(format!("Invalid listen address {}: {}", settings.listen_addr, e)))?;

    let cache_store = JsonFileStore::open(get_data_file_path(CACHE_FILE)).await?;
    let credentials = JsonFileStore::open(get_data_file_path(CREDENTIALS_FILE)).await?;

    let cache = CacheStore::new(Arc::new(cache_store), settings.ttl_policy()).with_enabled(settings.cache_enabled);
    let api = ApiClient::new(&settings.api_base_url, TokenStore::new(Arc::new(credentials)), settings.fetch_timeout())?;
    let html = Arc::new(HtmlAdapter::new(site_client(
        settings.site_session_cookie.as_deref(),
        settings.fetch_timeout(),
    )?));

    let adapters = AdapterRegistry::standard(html, api.clone(), settings.counts_source);
    let broadcaster = Broadcaster::new();
    let scheduler =
        Scheduler::with_api(adapters, cache.clone(), broadcaster.clone(), api.clone(), settings.scheduler_config());
    let service = CardDataService::new(cache, scheduler, broadcaster, Some(api));

    let _cleanup = service.spawn_cache_cleanup(settings.cleanup_interval());

    tracing::info!("Starting card stats service on {}", addr);
    WebSocketServer::new(service).run(addr).await
}
