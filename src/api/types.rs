use serde::{
    Deserialize,
    Serialize,
};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<u64>,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiCard {
    pub id: u64,
    pub name: String,
    pub rank: String,
    #[serde(default, alias = "animeName")]
    pub anime_name: Option<String>,
    #[serde(default, alias = "animeLink")]
    pub anime_link: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDeckCard {
    pub card_id: u64,
    pub rank: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDeck {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cards: Vec<ApiDeckCard>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// One collection counter as the API stores it (`trade`, `need`, `owned`,
/// `unlocked_owned`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStatEntry {
    pub card_id: u64,
    pub collection: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSubmission {
    pub stats: Vec<CardStatEntry>,
}
