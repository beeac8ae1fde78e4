//! Card statistics acquisition and caching service.
//!
//! Browser tabs talk to the service over a local WebSocket. Requests for card
//! statistics go through a rate-limited [`queue::Scheduler`], answers are cached
//! in [`cache::CacheStore`] and pushed to every tab by
//! [`websocket::Broadcaster`]. The [`widgets`] module is the consumer side that
//! turns those answers into overlays.

pub mod api;
pub mod cache;
pub mod core;
pub mod persistence;
pub mod queue;
pub mod service;
pub mod settings;
pub mod sources;
pub mod websocket;
pub mod widgets;

pub use crate::{
    core::{
        CardStatsError,
        FetchError,
    },
    service::CardDataService,
    settings::Settings,
};
