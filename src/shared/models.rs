pub mod page;
pub mod settings;
pub mod task;
pub mod task_filters;
pub mod task_priority;
pub mod task_stats;
pub mod task_status;
pub mod token_pair;
pub mod user;
