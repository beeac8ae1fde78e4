use std::sync::Arc;

use serde_json::Value;

use crate::persistence::KeyValueStore;

pub const TOKEN_KEY: &str = "ass_api_token";

/// Bearer token kept in the credentials space. Storage failures are logged and
/// read as "no token".
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn get_token(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY).await {
            Ok(Some(Value::String(token))) if !token.is_empty() => Some(token),
            Ok(_) => None,
            Err(e) => {
                tracing::error!("Token get error: {}", e);
                None
            }
        }
    }

    pub async fn set_token(&self, token: &str) {
        if let Err(e) = self.store.set(TOKEN_KEY, Value::String(token.to_string())).await {
            tracing::error!("Token set error: {}", e);
        }
    }

    pub async fn remove_token(&self) {
        if let Err(e) = self.store.remove(&[TOKEN_KEY.to_string()]).await {
            tracing::error!("Token remove error: {}", e);
        }
    }
}
