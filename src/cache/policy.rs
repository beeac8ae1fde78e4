use std::time::Duration;

use crate::core::{
    CardId,
    CardStatRecord,
    DataSource,
    ParseType,
};

/// Namespace shared by every cache schema version. Clearing removes all of it.
pub const CACHE_NAMESPACE: &str = "card_stats_";
/// Bump when the stored record layout changes; old entries become unreachable.
pub const CACHE_VERSION: &str = "v3";

pub const DEFAULT_HTML_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const DEFAULT_API_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub api: Duration,
    pub html: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self { api: DEFAULT_API_TTL, html: DEFAULT_HTML_TTL }
    }
}

impl TtlPolicy {
    pub fn ttl(&self, source: DataSource) -> Duration {
        match source {
            DataSource::Api => self.api,
            DataSource::Html => self.html,
            DataSource::Site => Duration::ZERO,
        }
    }

    pub fn is_fresh(&self, record: &CardStatRecord, now_ms: i64) -> bool {
        let age = now_ms.saturating_sub(record.timestamp);
        age >= 0 && (age as u128) < self.ttl(record.source).as_millis()
    }
}

/// Single predicate for every read and write path.
pub fn is_cacheable(parse_type: ParseType) -> bool {
    !parse_type.is_site_data()
}

pub fn cache_key(card_id: &CardId, parse_type: ParseType, username: Option<&str>) -> String {
    let mut key = format!("{CACHE_NAMESPACE}{CACHE_VERSION}:{}:{}", parse_type.as_str(), card_id);
    if parse_type.requires_username() {
        if let Some(username) = username {
            key.push(':');
            key.push_str(username.trim());
        }
    }
    key
}

pub fn current_prefix() -> String {
    format!("{CACHE_NAMESPACE}{CACHE_VERSION}:")
}
