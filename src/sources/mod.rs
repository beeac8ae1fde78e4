//! Source adapters turn a card identifier plus a parse type into a payload.
//!
//! The scheduler only sees [`SourceAdapter`]; which adapter serves a parse type
//! is decided once, in [`AdapterRegistry`].

pub mod api;
pub mod html;
pub mod patterns;
pub mod site;

use std::{
    collections::HashMap,
    sync::Arc,
};

use async_trait::async_trait;
use serde::{
    Deserialize,
    Serialize,
};

pub use api::ApiStatsAdapter;
pub use html::HtmlAdapter;
pub use patterns::{
    PageParser,
    PatternParser,
};
pub use site::SiteDataAdapter;
use crate::{
    api::ApiClient,
    core::{
        models::scoped_username,
        CardId,
        DataSource,
        FetchError,
        ParseType,
        StatPayload,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    pub card_id: CardId,
    /// Site origin, e.g. `https://animestars.org`.
    pub origin: String,
    pub parse_type: ParseType,
    pub username: Option<String>,
}

impl FetchRequest {
    pub fn new(card_id: CardId, origin: &str, parse_type: ParseType, username: Option<String>) -> Self {
        Self {
            card_id,
            origin: origin.trim_end_matches('/').to_string(),
            parse_type,
            username: scoped_username(parse_type, username),
        }
    }

    pub fn key(&self) -> (CardId, ParseType, Option<String>) {
        (self.card_id.clone(), self.parse_type, self.username.clone())
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> DataSource;

    async fn fetch(&self, request: &FetchRequest) -> Result<StatPayload, FetchError>;
}

/// Where `counts` and `unlocked` come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountsSource {
    #[default]
    Html,
    Api,
}

#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: HashMap<ParseType, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, parse_type: ParseType, adapter: Arc<dyn SourceAdapter>) -> &mut Self {
        self.adapters.insert(parse_type, adapter);
        self
    }

    pub fn with(mut self, parse_type: ParseType, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.register(parse_type, adapter);
        self
    }

    pub fn get(&self, parse_type: ParseType) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(&parse_type).cloned()
    }

    /// Duplicates always come from the site's pages and site data always from the
    /// API; counts follow `counts_source`.
    pub fn standard(html: Arc<HtmlAdapter>, api: ApiClient, counts_source: CountsSource) -> Self {
        let site: Arc<dyn SourceAdapter> = Arc::new(SiteDataAdapter::new(api.clone()));
        let counts: Arc<dyn SourceAdapter> = match counts_source {
            CountsSource::Html => html.clone(),
            CountsSource::Api => Arc::new(ApiStatsAdapter::new(api)),
        };

        Self::new()
            .with(ParseType::Counts, counts.clone())
            .with(ParseType::Unlocked, counts)
            .with(ParseType::Duplicates, html)
            .with(ParseType::SiteCard, site.clone())
            .with(ParseType::SiteDeck, site)
    }
}
