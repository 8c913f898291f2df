use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh: String,
}
