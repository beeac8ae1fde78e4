use std::sync::{
    Arc,
    Mutex,
    PoisonError,
};

use tokio::sync::mpsc::{
    self,
    error::TrySendError,
};
use uuid::Uuid;

use super::types::{
    Broadcast,
    ConnectedClient,
    TabId,
};

const TAB_CHANNEL_CAPACITY: usize = 64;

/// Fan-out to every connected tab.
///
/// Delivery is best effort and at most once: a tab whose channel is full is
/// skipped, a closed one is dropped, and neither stops delivery to the rest.
#[derive(Clone, Default)]
pub struct Broadcaster {
    clients: Arc<Mutex<Vec<ConnectedClient>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> (TabId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(TAB_CHANNEL_CAPACITY);
        let id = Uuid::new_v4();

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.push(ConnectedClient { id, tx });
        tracing::debug!("Tab {} registered. Total tabs: {}", id, clients.len());

        (id, rx)
    }

    pub fn unregister(&self, id: TabId) {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.retain(|client| client.id != id && !client.is_closed());
        tracing::debug!("Tab {} unregistered. Total tabs: {}", id, clients.len());
    }

    pub fn sender(&self, id: TabId) -> Option<mpsc::Sender<String>> {
        let clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.iter().find(|client| client.id == id).map(|client| client.tx.clone())
    }

    pub fn tab_count(&self) -> usize {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.retain(|client| !client.is_closed());
        clients.len()
    }

    /// Returns how many tabs accepted the message.
    pub fn broadcast(&self, message: &Broadcast) -> usize {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize broadcast: {}", e);
                return 0;
            }
        };

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let initial_count = clients.len();
        let mut delivered = 0;

        clients.retain(|client| match client.tx.try_send(json.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Tab {} is not keeping up, skipping broadcast", client.id);
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });

        let removed = initial_count - clients.len();
        if removed > 0 {
            tracing::debug!("Removed {} closed tabs during broadcast", removed);
        }

        delivered
    }
}
