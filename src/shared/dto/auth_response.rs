use serde::{Deserialize, Serialize};

use crate::{token_pair::TokenPair, user::User};

/// Body of a successful login or registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub tokens: TokenPair,
}
