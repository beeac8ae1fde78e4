use async_trait::async_trait;

use super::{
    FetchRequest,
    SourceAdapter,
};
use crate::{
    api::{
        ApiClient,
        CardStatEntry,
    },
    core::{
        Counts,
        DataSource,
        FetchError,
        ParseType,
        StatPayload,
    },
};

/// Counts served by the companion API instead of the site's pages.
pub struct ApiStatsAdapter {
    client: ApiClient,
}

impl ApiStatsAdapter {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

fn collection(entries: &[CardStatEntry], name: &str) -> Option<u32> {
    entries.iter().find(|e| e.collection == name).map(|e| e.count)
}

pub(crate) fn counts_from_entries(parse_type: ParseType, entries: &[CardStatEntry]) -> Result<Counts, FetchError> {
    match parse_type {
        ParseType::Counts => {
            let (Some(trade), Some(need), Some(owner)) = (
                collection(entries, "trade"),
                collection(entries, "need"),
                collection(entries, "owned"),
            ) else {
                return Err(FetchError::NotFound("No statistics for card".to_string()));
            };
            Ok(Counts { trade, need, owner })
        }
        ParseType::Unlocked => {
            let owner = collection(entries, "unlocked_owned")
                .ok_or_else(|| FetchError::NotFound("No unlocked statistics for card".to_string()))?;
            Ok(Counts {
                owner,
                need: collection(entries, "unlocked_need").unwrap_or(0),
                trade: collection(entries, "unlocked_trade").unwrap_or(0),
            })
        }
        other => Err(FetchError::Unsupported(other.to_string())),
    }
}

#[async_trait]
impl SourceAdapter for ApiStatsAdapter {
    fn source(&self) -> DataSource {
        DataSource::Api
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<StatPayload, FetchError> {
        if !matches!(request.parse_type, ParseType::Counts | ParseType::Unlocked) {
            return Err(FetchError::Unsupported(request.parse_type.to_string()));
        }
        let entries = self.client.card_stats_last(&request.card_id).await?;
        Ok(StatPayload::Counts(counts_from_entries(request.parse_type, &entries)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(collection: &str, count: u32) -> CardStatEntry {
        CardStatEntry { card_id: 1, collection: collection.to_string(), count }
    }

    #[test]
    fn test_counts_need_all_three_collections() {
        let entries = vec![entry("trade", 46), entry("need", 14), entry("owned", 642)];
        assert_eq!(
            counts_from_entries(ParseType::Counts, &entries).unwrap(),
            Counts { trade: 46, need: 14, owner: 642 }
        );

        let partial = vec![entry("trade", 46)];
        assert!(matches!(counts_from_entries(ParseType::Counts, &partial), Err(FetchError::NotFound(_))));
    }

    #[test]
    fn test_unlocked_counts() {
        let entries = vec![entry("owned", 9), entry("unlocked_owned", 3)];
        assert_eq!(
            counts_from_entries(ParseType::Unlocked, &entries).unwrap(),
            Counts { trade: 0, need: 0, owner: 3 }
        );
        assert!(counts_from_entries(ParseType::Unlocked, &[entry("owned", 1)]).is_err());
    }
}
