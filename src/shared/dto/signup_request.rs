use serde::{Deserialize, Serialize};

/// Registration fields. Whether the two passwords match is checked by the
/// caller before submitting; the server checks again.
#[derive(Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub password_confirm: String,
}

impl SignupRequest {
    pub fn passwords_match(&self) -> bool {
        self.password == self.password_confirm
    }
}

impl std::fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}
