use thiserror::Error;
use tokio::sync::mpsc::error::SendError;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum CardStatsError {
    #[error("I/O error: {0}")]
    Io(Box<std::io::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Reqwest error: {0}")]
    Reqwest(Box<reqwest::Error>),

    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    #[error("WebSocket send error: {0}")]
    WebSocketSend(String),

    #[error("Storage error: {0}")]
    Store(String),

    #[error("CardStatsError: {0}")]
    Custom(String),
}

impl<T> From<SendError<T>> for CardStatsError {
    fn from(error: SendError<T>) -> Self {
        CardStatsError::WebSocketSend(error.to_string())
    }
}

impl From<std::io::Error> for CardStatsError {
    fn from(error: std::io::Error) -> Self {
        CardStatsError::Io(Box::new(error))
    }
}

impl From<reqwest::Error> for CardStatsError {
    fn from(error: reqwest::Error) -> Self {
        CardStatsError::Reqwest(Box::new(error))
    }
}

impl From<tungstenite::Error> for CardStatsError {
    fn from(error: tungstenite::Error) -> Self {
        CardStatsError::WebSocket(Box::new(error))
    }
}

/// Failure of a single source adapter call.
///
/// Transport-level problems (`Transport`, `NotAuthenticated`, `Timeout`) are kept
/// apart from `NotFound` so the scheduler can decide what to retry, and `Auth`
/// marks a rejected API credential.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request failed{}: {message}", status_suffix(.status))]
    Transport { status: Option<u16>, message: String },

    #[error("User is not authenticated on the site")]
    NotAuthenticated,

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication failed - token removed")]
    Auth,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No source configured for {0}")]
    Unsupported(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" with HTTP {s}")).unwrap_or_default()
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        FetchError::Transport { status: None, message: message.into() }
    }

    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        FetchError::Transport { status: Some(status), message: message.into() }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    /// Only a 403 from the scraped site is worth a second attempt; the site answers
    /// that way when requests arrive too quickly.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transport { status: Some(403), .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => FetchError::http_status(status.as_u16(), error.to_string()),
            None if error.is_decode() => FetchError::Parse(error.to_string()),
            None => FetchError::transport(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(error: serde_json::Error) -> Self {
        FetchError::Parse(error.to_string())
    }
}
