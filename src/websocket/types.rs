use serde::{
    Deserialize,
    Serialize,
};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    cache::CacheStats,
    core::{
        CardDataItem,
        CardId,
        ParseType,
    },
};

pub type TabId = Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ServerState {
    Running,
    #[default]
    Stopped,
    Error(String),
    Starting,
}

/// Messages a tab sends to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    FetchCardDataQueue {
        card_ids: Vec<CardId>,
        origin: String,
        parse_types: Vec<ParseType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    FetchCachedCardData {
        card_ids: Vec<CardId>,
        parse_types: Vec<ParseType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    ClearCardDataQueue,
    GetCardDataQueueSize,
    ClearAllCardCaches,
    GetCardCacheStats,
    TestApiConnection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Envelope {
    #[serde(rename = "messageId", default)]
    pub message_id: Option<String>,
    #[serde(flatten)]
    pub message: ClientMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServiceResponse {
    Queued { queued: usize },
    Found { found: usize },
    Success { success: bool },
    QueueSize { size: usize },
    CacheCleared { cleared: bool, removed: usize },
    CacheStats(CacheStats),
    ApiConnection { success: bool, authenticated: bool },
    Error { error: String },
}

/// Response routed back to the tab that asked.
#[derive(Debug, Serialize)]
pub struct Reply<'a> {
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<&'a str>,
    pub response: &'a ServiceResponse,
}

/// Messages pushed to every connected tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Broadcast {
    CardDataUpdated { items: Vec<CardDataItem> },
    CardDataQueueCleared,
}

#[derive(Clone, Debug)]
pub struct ConnectedClient {
    pub id: TabId,
    pub tx: mpsc::Sender<String>,
}

impl ConnectedClient {
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
