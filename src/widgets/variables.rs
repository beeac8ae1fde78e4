use std::collections::HashMap;

use crate::core::{
    CardStatRecord,
    ParseType,
    StatPayload,
};

/// Always available from the card element itself.
pub const CARD_ID_VARIABLE: &str = "cardId";

pub type VariableMap = HashMap<String, String>;

pub const COUNTS_VARIABLES: [&str; 3] = ["need", "owner", "trade"];
pub const UNLOCKED_VARIABLES: [&str; 3] = ["unlockNeed", "unlockOwner", "unlockTrade"];
pub const DUPLICATES_VARIABLES: [&str; 1] = ["duplicates"];
pub const SITE_CARD_VARIABLES: [&str; 5] = ["cardName", "cardRank", "cardAnime", "cardAnimeLink", "cardAuthor"];
pub const SITE_DECK_VARIABLES: [&str; 8] = [
    "deckCountASS",
    "deckCountS",
    "deckCountA",
    "deckCountB",
    "deckCountC",
    "deckCountD",
    "deckCountE",
    "deckCountTotal",
];

pub fn variables_of(parse_type: ParseType) -> &'static [&'static str] {
    match parse_type {
        ParseType::Counts => &COUNTS_VARIABLES,
        ParseType::Unlocked => &UNLOCKED_VARIABLES,
        ParseType::Duplicates => &DUPLICATES_VARIABLES,
        ParseType::SiteCard => &SITE_CARD_VARIABLES,
        ParseType::SiteDeck => &SITE_DECK_VARIABLES,
    }
}

/// Parse type that has to be fetched for `variable`. `None` for `cardId` and for
/// names nothing provides.
pub fn parse_type_of(variable: &str) -> Option<ParseType> {
    ParseType::ALL.into_iter().find(|parse_type| variables_of(*parse_type).contains(&variable))
}

/// Values a record contributes, keyed by variable name.
pub fn record_values(record: &CardStatRecord) -> Vec<(&'static str, String)> {
    let names = variables_of(record.parse_type);
    let values: Vec<String> = match &record.data {
        StatPayload::Counts(counts) => {
            vec![counts.need.to_string(), counts.owner.to_string(), counts.trade.to_string()]
        }
        StatPayload::Duplicates { duplicates } => vec![duplicates.to_string()],
        StatPayload::SiteCard(card) => vec![
            card.name.clone(),
            card.rank.to_ascii_uppercase(),
            card.anime.clone(),
            card.anime_link.clone(),
            card.author.clone(),
        ],
        StatPayload::SiteDeck(deck) => [deck.ass, deck.s, deck.a, deck.b, deck.c, deck.d, deck.e, deck.total]
            .iter()
            .map(u32::to_string)
            .collect(),
    };

    if names.len() != values.len() {
        tracing::warn!(
            "{} record for card {} carries a mismatched payload",
            record.parse_type,
            record.card_id
        );
        return Vec::new();
    }
    names.iter().copied().zip(values).collect()
}
