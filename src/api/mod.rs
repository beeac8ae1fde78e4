pub mod client;
pub mod token;
pub mod types;

pub use client::{
    ApiClient,
    DEFAULT_BASE_URL,
};
pub use token::TokenStore;
pub use types::{
    ApiCard,
    ApiDeck,
    CardStatEntry,
};
