use std::time::Duration;

use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    core::utils::now_millis,
    sources::FetchRequest,
};

pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Which end of the queue the worker takes from.
///
/// `Lifo` serves the most recently requested cards first, which is what a user
/// scrolling through a long list is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOrder {
    #[default]
    Lifo,
    Fifo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQueueItem {
    pub request: FetchRequest,
    /// Epoch milliseconds.
    pub enqueued_at: i64,
}

impl FetchQueueItem {
    pub fn new(request: FetchRequest) -> Self {
        Self { request, enqueued_at: now_millis() }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause after every network completion and before the single 403 retry.
    pub request_delay: Duration,
    pub fetch_timeout: Duration,
    pub order: QueueOrder,
    /// Forward scraped counts to the API when a token is available.
    pub submit_scraped_stats: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            request_delay: DEFAULT_REQUEST_DELAY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            order: QueueOrder::default(),
            submit_scraped_stats: false,
        }
    }
}
