use std::fmt;

use serde::{
    Deserialize,
    Deserializer,
    Serialize,
};

/// Opaque card identifier. The site hands these out as numbers, the content side
/// reads them from attributes as strings; both forms are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Numeric form used by the remote API.
    pub fn as_number(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(id: &str) -> Self {
        CardId::new(id)
    }
}

impl From<u64> for CardId {
    fn from(id: u64) -> Self {
        CardId(id.to_string())
    }
}

impl<'de> Deserialize<'de> for CardId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => CardId::from(n),
            RawId::Text(s) => CardId::new(s),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParseType {
    Counts,
    Unlocked,
    Duplicates,
    SiteCard,
    SiteDeck,
}

impl ParseType {
    pub const ALL: [ParseType; 5] = [
        ParseType::Counts,
        ParseType::Unlocked,
        ParseType::Duplicates,
        ParseType::SiteCard,
        ParseType::SiteDeck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParseType::Counts => "counts",
            ParseType::Unlocked => "unlocked",
            ParseType::Duplicates => "duplicates",
            ParseType::SiteCard => "siteCard",
            ParseType::SiteDeck => "siteDeck",
        }
    }

    /// Site data is derived on demand and never stored in the card cache.
    pub fn is_site_data(&self) -> bool {
        matches!(self, ParseType::SiteCard | ParseType::SiteDeck)
    }

    pub fn requires_username(&self) -> bool {
        matches!(self, ParseType::Duplicates)
    }
}

impl fmt::Display for ParseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapter family a record came from. Drives the cache TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Api,
    Html,
    Site,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counts {
    pub trade: u32,
    pub need: u32,
    pub owner: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteCardInfo {
    pub name: String,
    pub rank: String,
    #[serde(default)]
    pub anime: String,
    #[serde(default)]
    pub anime_link: String,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeckCounts {
    pub ass: u32,
    pub s: u32,
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub d: u32,
    pub e: u32,
    pub total: u32,
}

impl DeckCounts {
    /// Counts one card of the given rank. Unknown ranks only count towards the total.
    pub fn add_rank(&mut self, rank: &str) {
        match rank.trim().to_ascii_lowercase().as_str() {
            "ass" => self.ass += 1,
            "s" => self.s += 1,
            "a" => self.a += 1,
            "b" => self.b += 1,
            "c" => self.c += 1,
            "d" => self.d += 1,
            "e" => self.e += 1,
            _ => {}
        }
        self.total += 1;
    }
}

/// Parse type specific data. `Counts` is shared by `counts` and `unlocked`, the
/// record's parse type tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatPayload {
    Counts(Counts),
    Duplicates { duplicates: u32 },
    SiteCard(SiteCardInfo),
    SiteDeck(DeckCounts),
}

impl StatPayload {
    pub fn fits(&self, parse_type: ParseType) -> bool {
        matches!(
            (self, parse_type),
            (StatPayload::Counts(_), ParseType::Counts | ParseType::Unlocked)
                | (StatPayload::Duplicates { .. }, ParseType::Duplicates)
                | (StatPayload::SiteCard(_), ParseType::SiteCard)
                | (StatPayload::SiteDeck(_), ParseType::SiteDeck)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardStatRecord {
    pub card_id: CardId,
    pub parse_type: ParseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub data: StatPayload,
    pub source: DataSource,
    /// Write time, epoch milliseconds.
    pub timestamp: i64,
}

impl CardStatRecord {
    pub fn new(
        card_id: CardId,
        parse_type: ParseType,
        username: Option<String>,
        data: StatPayload,
        source: DataSource,
    ) -> Self {
        Self {
            card_id,
            parse_type,
            username: scoped_username(parse_type, username),
            data,
            source,
            timestamp: super::utils::now_millis(),
        }
    }
}

/// Usernames only take part in the identity of parse types that need one.
pub fn scoped_username(parse_type: ParseType, username: Option<String>) -> Option<String> {
    if parse_type.requires_username() {
        username.filter(|u| !u.trim().is_empty())
    } else {
        None
    }
}

/// Broadcast element: a fresh or cached record, or the error a fetch ended with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CardDataItem {
    Record(CardStatRecord),
    Error {
        #[serde(rename = "cardId")]
        card_id: CardId,
        #[serde(rename = "parseType")]
        parse_type: ParseType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        error: String,
    },
}

impl CardDataItem {
    pub fn card_id(&self) -> &CardId {
        match self {
            CardDataItem::Record(record) => &record.card_id,
            CardDataItem::Error { card_id, .. } => card_id,
        }
    }

    pub fn parse_type(&self) -> ParseType {
        match self {
            CardDataItem::Record(record) => record.parse_type,
            CardDataItem::Error { parse_type, .. } => *parse_type,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            CardDataItem::Record(record) => record.username.as_deref(),
            CardDataItem::Error { username, .. } => username.as_deref(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CardDataItem::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_id_accepts_numbers_and_strings() {
        let ids: Vec<CardId> = serde_json::from_str(r#"[4779, "4780", " 12 "]"#).unwrap();
        assert_eq!(ids, vec![CardId::from(4779), CardId::from("4780"), CardId::from("12")]);
        assert_eq!(serde_json::to_string(&ids[0]).unwrap(), "\"4779\"");
        assert_eq!(ids[0].as_number(), Some(4779));
    }

    #[test]
    fn test_parse_type_names() {
        let parsed: Vec<ParseType> =
            serde_json::from_str(r#"["counts","unlocked","duplicates","siteCard","siteDeck"]"#)
                .unwrap();
        assert_eq!(parsed, ParseType::ALL.to_vec());
        assert!(ParseType::SiteCard.is_site_data());
        assert!(ParseType::SiteDeck.is_site_data());
        assert!(!ParseType::Counts.is_site_data());
        assert!(ParseType::Duplicates.requires_username());
    }

    #[test]
    fn test_record_json_shape() {
        let mut record = CardStatRecord::new(
            CardId::from(4779),
            ParseType::Counts,
            Some("ignored".into()),
            StatPayload::Counts(Counts { trade: 46, need: 14, owner: 642 }),
            DataSource::Html,
        );
        record.timestamp = 1000;
        assert!(record.username.is_none());

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "cardId": "4779",
                "parseType": "counts",
                "data": { "trade": 46, "need": 14, "owner": 642 },
                "source": "html",
                "timestamp": 1000
            })
        );
        let back: CardStatRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_untagged_payloads_resolve_by_shape() {
        let deck: StatPayload = serde_json::from_str(
            r#"{"ass":1,"s":0,"a":2,"b":0,"c":0,"d":0,"e":0,"total":3}"#,
        )
        .unwrap();
        assert!(deck.fits(ParseType::SiteDeck));

        let dup: StatPayload = serde_json::from_str(r#"{"duplicates":3}"#).unwrap();
        assert_eq!(dup, StatPayload::Duplicates { duplicates: 3 });

        let card: StatPayload =
            serde_json::from_str(r#"{"name":"Rem","rank":"s","anime":"Re:Zero"}"#).unwrap();
        assert!(card.fits(ParseType::SiteCard));
    }

    #[test]
    fn test_error_item_shape() {
        let item = CardDataItem::Error {
            card_id: CardId::from(1),
            parse_type: ParseType::Counts,
            username: None,
            error: "Card not found".into(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cardId": "1", "parseType": "counts", "error": "Card not found"})
        );
        let back: CardDataItem = serde_json::from_value(json).unwrap();
        assert!(back.is_error());
    }

    #[test]
    fn test_deck_rank_buckets() {
        let mut deck = DeckCounts::default();
        for rank in ["ass", "S", "a", "a", "e", "x"] {
            deck.add_rank(rank);
        }
        assert_eq!(deck.ass, 1);
        assert_eq!(deck.s, 1);
        assert_eq!(deck.a, 2);
        assert_eq!(deck.e, 1);
        assert_eq!(deck.total, 6);
    }
}
