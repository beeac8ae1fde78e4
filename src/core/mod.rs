pub mod errors;
pub mod http;
pub mod models;
pub mod utils;

pub use errors::{
    CardStatsError,
    FetchError,
};
pub use models::{
    CardDataItem,
    CardId,
    CardStatRecord,
    Counts,
    DataSource,
    DeckCounts,
    ParseType,
    SiteCardInfo,
    StatPayload,
};
