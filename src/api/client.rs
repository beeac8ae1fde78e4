use std::time::Duration;

use reqwest::{
    header::AUTHORIZATION,
    Client,
    Method,
    StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::{
    json,
    Value,
};

use super::{
    token::TokenStore,
    types::{
        ApiCard,
        ApiDeck,
        CardStatEntry,
        LoginResponse,
        Page,
        StatsSubmission,
        UserInfo,
    },
};
use crate::core::{
    http,
    CardId,
    CardStatRecord,
    CardStatsError,
    FetchError,
    ParseType,
    StatPayload,
};

pub const DEFAULT_BASE_URL: &str = "https://ass-api.strawberrycat.dev";

const LOGIN: &str = "/api/auth/login";
const ME: &str = "/api/auth/me";
const CARD_DETAIL: &str = "/api/card/";
const DECKS: &str = "/api/deck/";
const CARD_STATS_LAST: &str = "/api/card/stats/last";
const CARD_STATS_ADD: &str = "/api/card/stats/add";

/// Client for the companion statistics API.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: TokenStore,
}

impl ApiClient {
    pub fn new(base_url: &str, tokens: TokenStore, timeout: Duration) -> Result<Self, CardStatsError> {
        Ok(Self {
            http: http::api_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    async fn make_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self.http.request(method, &url).query(query);

        if let Some(token) = self.tokens.get_token().await {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("API rejected the token for {}, removing it", endpoint);
            self.tokens.remove_token().await;
            return Err(FetchError::Auth);
        }
        if !status.is_success() {
            return Err(FetchError::http_status(
                status.as_u16(),
                format!("HTTP {}: {}", status.as_u16(), status.canonical_reason().unwrap_or("")),
            ));
        }

        Ok(response.json::<T>().await?)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, FetchError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, LOGIN))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(FetchError::http_status(status, format!("Login failed: {status}")));
        }

        let data: LoginResponse = response.json().await?;
        if let Some(token) = &data.access_token {
            self.tokens.set_token(token).await;
            tracing::info!("Logged in to the stats API as {}", username);
        }
        Ok(data)
    }

    pub async fn current_user(&self) -> Result<UserInfo, FetchError> {
        self.make_request(Method::GET, ME, &[], None).await
    }

    pub async fn is_authenticated(&self) -> bool {
        if self.tokens.get_token().await.is_none() {
            return false;
        }
        self.current_user().await.is_ok()
    }

    pub async fn card(&self, card_id: &CardId) -> Result<ApiCard, FetchError> {
        let id = numeric_id(card_id)?;
        self.make_request(Method::GET, &format!("{CARD_DETAIL}{id}"), &[], None).await
    }

    pub async fn card_stats_last(&self, card_id: &CardId) -> Result<Vec<CardStatEntry>, FetchError> {
        let id = numeric_id(card_id)?;
        self.make_request(Method::GET, CARD_STATS_LAST, &[("card_id", id.to_string())], None).await
    }

    /// First deck containing the card, if any.
    pub async fn deck_by_card(&self, card_id: &CardId) -> Result<Option<ApiDeck>, FetchError> {
        let id = numeric_id(card_id)?;
        let query = json!({
            "filter": { "cards": { "any": { "card_id": { "eq": id } } } },
            "page": 1,
            "per_page": 1
        });
        let page: Page<ApiDeck> = self.make_request(Method::POST, DECKS, &[], Some(query)).await?;
        Ok(page.items.into_iter().next())
    }

    /// Sends scraped counts to the API. Returns `false` when the record carries
    /// nothing the API collects.
    pub async fn submit_card_stats(&self, record: &CardStatRecord) -> Result<bool, FetchError> {
        let stats = submission_entries(record)?;
        if stats.is_empty() {
            return Ok(false);
        }

        let body = serde_json::to_value(StatsSubmission { stats })?;
        let _: Value = self.make_request(Method::POST, CARD_STATS_ADD, &[], Some(body)).await?;
        Ok(true)
    }
}

fn numeric_id(card_id: &CardId) -> Result<u64, FetchError> {
    card_id.as_number().ok_or_else(|| FetchError::NotFound(format!("Invalid card id {card_id}")))
}

pub(crate) fn submission_entries(record: &CardStatRecord) -> Result<Vec<CardStatEntry>, FetchError> {
    let StatPayload::Counts(counts) = &record.data else {
        return Ok(Vec::new());
    };
    let card_id = numeric_id(&record.card_id)?;
    let entry = |collection: &str, count: u32| CardStatEntry { card_id, collection: collection.to_string(), count };

    Ok(match record.parse_type {
        ParseType::Counts => vec![
            entry("trade", counts.trade),
            entry("need", counts.need),
            entry("owned", counts.owner),
        ],
        ParseType::Unlocked => vec![entry("unlocked_owned", counts.owner)],
        _ => Vec::new(),
    })
}
