use std::time::Duration;

use reqwest::{
    header::{
        HeaderMap,
        HeaderValue,
        ACCEPT,
        COOKIE,
        USER_AGENT,
    },
    Client,
    Response,
    Url,
};

use crate::core::{
    CardStatsError,
    FetchError,
};

const CLIENT_USER_AGENT: &str = "cardstats/0.1 (+reqwest)";

/// Client for the scraped site. The session cookie stands in for the browser's
/// logged-in cookies.
pub fn site_client(session_cookie: Option<&str>, timeout: Duration) -> Result<Client, CardStatsError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml"));

    if let Some(cookie) = session_cookie.filter(|c| !c.trim().is_empty()) {
        let value = HeaderValue::from_str(cookie.trim())
            .map_err(|e| CardStatsError::Custom(format!("Invalid session cookie: {e}")))?;
        headers.insert(COOKIE, value);
    }

    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| CardStatsError::Custom(format!("HTTP client build failed: {e}")))
}

pub fn api_client(timeout: Duration) -> Result<Client, CardStatsError> {
    Client::builder()
        .user_agent(CLIENT_USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| CardStatsError::Custom(format!("HTTP client build failed: {e}")))
}

pub fn ensure_success(resp: &Response) -> Result<(), FetchError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::http_status(
            status.as_u16(),
            format!("{} from {}", status.canonical_reason().unwrap_or("HTTP error"), resp.url()),
        ));
    }
    Ok(())
}

/// The site answers unauthenticated requests with a redirect to its login or
/// registration page instead of an error status.
pub fn redirected_to_login(resp: &Response, requested: &Url) -> bool {
    is_login_redirect(requested, resp.url())
}

/// True when the request ended up somewhere else and that place is the login or
/// registration page.
pub fn is_login_redirect(requested: &Url, final_url: &Url) -> bool {
    if requested == final_url {
        return false;
    }
    let first_segment = final_url
        .path_segments()
        .and_then(|mut segments| segments.find(|segment| !segment.is_empty()))
        .map(str::to_ascii_lowercase);
    matches!(first_segment.as_deref(), Some("login" | "register"))
}
