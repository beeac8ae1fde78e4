use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    Client,
    StatusCode,
    Url,
};

use super::{
    FetchRequest,
    PageParser,
    PatternParser,
    SourceAdapter,
};
use crate::core::{
    http,
    DataSource,
    FetchError,
    ParseType,
    StatPayload,
};

/// Fetches the site's own pages and hands the markup to a [`PageParser`].
pub struct HtmlAdapter {
    client: Client,
    parser: Arc<dyn PageParser>,
}

impl HtmlAdapter {
    pub fn new(client: Client) -> Self {
        Self { client, parser: Arc::new(PatternParser) }
    }

    pub fn with_parser(client: Client, parser: Arc<dyn PageParser>) -> Self {
        Self { client, parser }
    }

    pub fn page_url(request: &FetchRequest) -> Result<Url, FetchError> {
        let mut url = Url::parse(&request.origin)
            .map_err(|e| FetchError::transport(format!("Invalid origin {}: {e}", request.origin)))?;
        url.set_query(None);
        url.set_fragment(None);

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| FetchError::transport(format!("Invalid origin {}", request.origin)))?;
            segments.clear();
            match request.parse_type {
                ParseType::Counts | ParseType::Unlocked => {
                    segments.extend(["cards", "users", ""]);
                }
                ParseType::Duplicates => {
                    let username = request
                        .username
                        .as_deref()
                        .ok_or_else(|| FetchError::NotFound("Username required".to_string()))?;
                    segments.extend(["user", username, "cards", ""]);
                }
                other => return Err(FetchError::Unsupported(other.to_string())),
            }
        }

        match request.parse_type {
            ParseType::Counts | ParseType::Unlocked => {
                let unlocked = if request.parse_type == ParseType::Unlocked { "1" } else { "0" };
                url.query_pairs_mut()
                    .append_pair("id", request.card_id.as_str())
                    .append_pair("unlocked", unlocked);
            }
            _ => {
                url.query_pairs_mut().append_pair("card_id", request.card_id.as_str());
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl SourceAdapter for HtmlAdapter {
    fn source(&self) -> DataSource {
        DataSource::Html
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<StatPayload, FetchError> {
        let url = Self::page_url(request)?;
        tracing::debug!("GET {}", url);

        let response = self.client.get(url.clone()).send().await?;

        if http::redirected_to_login(&response, &url) {
            return Err(FetchError::NotAuthenticated);
        }
        if response.status() == StatusCode::FORBIDDEN {
            return Err(FetchError::http_status(403, "Forbidden"));
        }
        http::ensure_success(&response)?;

        let html = response.text().await?;
        self.parser.parse(request, &html)
    }
}
