use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpdateResponse {
    #[serde(default)]
    pub message: String,
    pub updated_count: u64,
}
