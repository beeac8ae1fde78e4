use std::{
    net::SocketAddr,
    sync::{
        Arc,
        Mutex,
        PoisonError,
    },
};

use tokio::net::TcpListener;

use super::{
    connection::handle_connection,
    types::ServerState,
};
use crate::{
    core::CardStatsError,
    service::CardDataService,
};

/// WebSocket endpoint the site tabs connect to.
#[derive(Clone)]
pub struct WebSocketServer {
    service: CardDataService,
    state: Arc<Mutex<ServerState>>,
}

impl WebSocketServer {
    pub fn new(service: CardDataService) -> Self {
        Self { service, state: Arc::new(Mutex::new(ServerState::default())) }
    }

    pub fn state(&self) -> ServerState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_state(&self, state: ServerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub async fn run(&self, addr: SocketAddr) -> Result<(), CardStatsError> {
        self.set_state(ServerState::Starting);

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                let message = format!("Failed to bind to address {}: {}", addr, e);
                self.set_state(ServerState::Error(message.clone()));
                return Err(CardStatsError::Custom(message));
            }
        };

        self.serve(listener).await
    }

    /// Accepts tabs on an already bound listener until accepting fails.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), CardStatsError> {
        let local_addr = listener.local_addr()?;
        self.set_state(ServerState::Running);
        tracing::info!("WebSocket server running on {}", local_addr);
        tracing::info!("Tabs can connect to: ws://{}/ws", local_addr);

        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    self.set_state(ServerState::Error(e.to_string()));
                    return Err(e.into());
                }
            };
            tracing::debug!("New connection from: {}", addr);

            let service = self.service.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, service).await {
                    tracing::warn!("Error handling connection from {}: {}", addr, e);
                }
            });
        }
    }
}
