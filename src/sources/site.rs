use async_trait::async_trait;

use super::{
    FetchRequest,
    SourceAdapter,
};
use crate::{
    api::{
        ApiCard,
        ApiClient,
        ApiDeck,
    },
    core::{
        DataSource,
        DeckCounts,
        FetchError,
        ParseType,
        SiteCardInfo,
        StatPayload,
    },
};

/// Card metadata and deck composition, each from a single detail fetch.
pub struct SiteDataAdapter {
    client: ApiClient,
}

impl SiteDataAdapter {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

pub(crate) fn card_info(card: ApiCard) -> SiteCardInfo {
    SiteCardInfo {
        name: card.name,
        rank: card.rank.to_ascii_lowercase(),
        anime: card.anime_name.unwrap_or_default(),
        anime_link: card.anime_link.unwrap_or_default(),
        author: card.author.unwrap_or_default(),
    }
}

pub(crate) fn deck_counts(deck: &ApiDeck) -> DeckCounts {
    let mut counts = DeckCounts::default();
    for card in &deck.cards {
        counts.add_rank(&card.rank);
    }
    counts
}

#[async_trait]
impl SourceAdapter for SiteDataAdapter {
    fn source(&self) -> DataSource {
        DataSource::Site
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<StatPayload, FetchError> {
        match request.parse_type {
            ParseType::SiteCard => {
                let card = self.client.card(&request.card_id).await?;
                Ok(StatPayload::SiteCard(card_info(card)))
            }
            ParseType::SiteDeck => {
                let deck = self
                    .client
                    .deck_by_card(&request.card_id)
                    .await?
                    .ok_or_else(|| FetchError::NotFound("Deck not found".to_string()))?;
                Ok(StatPayload::SiteDeck(deck_counts(&deck)))
            }
            other => Err(FetchError::Unsupported(other.to_string())),
        }
    }
}
