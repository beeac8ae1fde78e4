use std::net::SocketAddr;

use futures_util::{
    SinkExt,
    StreamExt,
};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;

use super::types::{
    Envelope,
    Reply,
    ServiceResponse,
};
use crate::{
    core::CardStatsError,
    service::CardDataService,
};

pub async fn handle_connection(
    stream: tokio::net::TcpStream,
    addr: SocketAddr,
    service: CardDataService,
) -> Result<(), CardStatsError> {
    let ws_stream = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| CardStatsError::Custom(format!("Error during WebSocket handshake: {}", e)))?;

    tracing::info!("WebSocket connection established with: {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let broadcaster = service.broadcaster().clone();
    let (tab_id, mut rx) = broadcaster.register();
    let tx = broadcaster
        .sender(tab_id)
        .ok_or_else(|| CardStatsError::Custom(format!("Tab {} vanished during registration", tab_id)))?;

    let forward_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(Message::text(msg)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(message)) => {
                tracing::debug!("Received message from tab {}: {}", addr, message);

                if message.as_str() == "PING" {
                    if let Err(e) = tx.send("PONG".to_string()).await {
                        tracing::warn!("Failed to send PONG: {}", e);
                    }
                    continue;
                }

                let (message_id, response) = match serde_json::from_str::<Envelope>(message.as_str()) {
                    Ok(envelope) => (envelope.message_id, service.handle(envelope.message).await),
                    Err(e) => {
                        tracing::warn!("Received message that's not a valid request: {}", e);
                        (None, ServiceResponse::Error { error: format!("Invalid message: {e}") })
                    }
                };

                if let Err(e) = send_reply(&tx, message_id.as_deref(), &response).await {
                    tracing::warn!("Failed to reply to tab {}: {}", addr, e);
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                tracing::info!("Tab {} disconnected", addr);
                break;
            }
            Err(e) => {
                tracing::warn!("Error from tab {}: {}", addr, e);
                break;
            }
            _ => {}
        }
    }

    forward_task.abort();
    drop(tx);
    broadcaster.unregister(tab_id);
    tracing::debug!("Tab {} removed. Tabs remaining: {}", addr, broadcaster.tab_count());

    Ok(())
}

async fn send_reply(
    tx: &mpsc::Sender<String>,
    message_id: Option<&str>,
    response: &ServiceResponse,
) -> Result<(), CardStatsError> {
    let json = serde_json::to_string(&Reply { message_id, response })?;
    tx.send(json).await?;
    Ok(())
}
