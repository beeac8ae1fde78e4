use std::{
    net::SocketAddr,
    time::Duration,
};

use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

use crate::{
    api::DEFAULT_BASE_URL,
    cache::{
        policy::{
            DEFAULT_API_TTL,
            DEFAULT_HTML_TTL,
        },
        TtlPolicy,
    },
    core::utils::duration_from_hours,
    persistence::{
        get_data_file_path,
        load_json_or_default,
        SETTINGS_FILE,
    },
    queue::{
        types::{
            DEFAULT_FETCH_TIMEOUT,
            DEFAULT_REQUEST_DELAY,
        },
        QueueOrder,
        SchedulerConfig,
    },
    sources::CountsSource,
    widgets::{
        renderer::DEFAULT_LOADING_TOKEN,
        resolve_widgets,
        EventTarget,
        LegacyWidgetSettings,
        RendererConfig,
        Widget,
    },
};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8767";

/// Stored settings. Keys match what the browser side writes, so one file can
/// be shared between both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    /// Seconds between network requests.
    #[serde(rename = "card-user-count-request-delay")]
    pub request_delay: f64,
    #[serde(rename = "card-user-count-cache-enabled")]
    pub cache_enabled: bool,
    #[serde(rename = "card-stats-html-ttl-hours")]
    pub html_ttl_hours: f64,
    #[serde(rename = "card-stats-api-ttl-hours")]
    pub api_ttl_hours: f64,
    /// Seconds before a single adapter call is abandoned.
    #[serde(rename = "card-stats-fetch-timeout")]
    pub fetch_timeout: f64,
    #[serde(rename = "card-stats-queue-order")]
    pub queue_order: QueueOrder,
    #[serde(rename = "card-stats-counts-source")]
    pub counts_source: CountsSource,
    #[serde(rename = "card-stats-submit-scraped")]
    pub submit_scraped: bool,
    pub api_base_url: String,
    pub site_session_cookie: Option<String>,
    pub listen_addr: String,
    pub cache_cleanup_interval_minutes: u64,
    #[serde(rename = "card-user-count-event-target")]
    pub event_target: EventTarget,
    pub card_widgets: Option<Value>,
    pub card_widgets_loading_token: String,
    #[serde(flatten)]
    pub legacy: LegacyWidgetSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_delay: DEFAULT_REQUEST_DELAY.as_secs_f64(),
            cache_enabled: true,
            html_ttl_hours: DEFAULT_HTML_TTL.as_secs_f64() / 3600.0,
            api_ttl_hours: DEFAULT_API_TTL.as_secs_f64() / 3600.0,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT.as_secs_f64(),
            queue_order: QueueOrder::default(),
            counts_source: CountsSource::default(),
            submit_scraped: false,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            site_session_cookie: None,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            cache_cleanup_interval_minutes: 60,
            event_target: EventTarget::default(),
            card_widgets: None,
            card_widgets_loading_token: DEFAULT_LOADING_TOKEN.to_string(),
            legacy: LegacyWidgetSettings::default(),
        }
    }
}

fn seconds(value: f64, fallback: Duration) -> Duration {
    if value < 0.0 {
        return fallback;
    }
    Duration::try_from_secs_f64(value).unwrap_or(fallback)
}

impl Settings {
    pub fn load() -> Self {
        let path = get_data_file_path(SETTINGS_FILE);
        tracing::debug!("Loading settings from {}", path.display());
        load_json_or_default(&path)
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy { api: duration_from_hours(self.api_ttl_hours), html: duration_from_hours(self.html_ttl_hours) }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            request_delay: seconds(self.request_delay, DEFAULT_REQUEST_DELAY),
            fetch_timeout: seconds(self.fetch_timeout, DEFAULT_FETCH_TIMEOUT),
            order: self.queue_order,
            submit_scraped_stats: self.submit_scraped,
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        seconds(self.fetch_timeout, DEFAULT_FETCH_TIMEOUT)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cache_cleanup_interval_minutes.max(1) * 60)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.listen_addr.parse()
    }

    pub fn widgets(&self) -> Vec<Widget> {
        resolve_widgets(self.card_widgets.as_ref(), &self.legacy)
    }

    pub fn renderer_config(&self, origin: &str, username: Option<String>) -> RendererConfig {
        RendererConfig {
            event_target: self.event_target,
            loading_token: self.card_widgets_loading_token.clone(),
            username,
            ..RendererConfig::new(origin, self.widgets())
        }
    }
}
