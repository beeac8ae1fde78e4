pub mod scheduler;
pub mod types;

pub use scheduler::Scheduler;
pub use types::{
    FetchQueueItem,
    QueueOrder,
    SchedulerConfig,
};
