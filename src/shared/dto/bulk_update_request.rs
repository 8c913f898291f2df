use serde::{Deserialize, Serialize};

use super::update_task_request::UpdateTaskRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdateRequest {
    pub task_ids: Vec<i64>,
    pub updates: UpdateTaskRequest,
}
