pub mod broadcast;
pub mod connection;
pub mod server;
pub mod types;

pub use broadcast::Broadcaster;
pub use server::WebSocketServer;
pub use types::{
    Broadcast,
    ClientMessage,
    Envelope,
    ServerState,
    ServiceResponse,
    TabId,
};
