use serde::{Deserialize, Serialize};

/// Aggregate counts computed server-side. One cache slot, no sub-keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskStats {
    pub total_tasks: u64,
    pub todo_tasks: u64,
    pub in_progress_tasks: u64,
    pub done_tasks: u64,
    pub overdue_tasks: u64,
}
