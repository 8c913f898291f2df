use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{task_priority::TaskPriority, task_status::TaskStatus};

/// How far ahead a due date counts as "due soon".
pub const DUE_SOON_DAYS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub user_id: i64,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date.is_some_and(|due| due < now)
    }

    pub fn is_due_soon(&self, now: DateTime<Utc>) -> bool {
        !self.is_overdue(now)
            && self
                .due_date
                .is_some_and(|due| due < now + Duration::days(DUE_SOON_DAYS))
    }
}
