use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{token_pair::TokenPair, user::User};

/// The client's record of who is logged in.
///
/// `current_user` and `tokens` are set and cleared together, so a user is
/// present exactly when an access token is held. Token expiry is not
/// checked locally; the backend reports it as `Unauthorized`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub current_user: Option<User>,
    pub tokens: Option<TokenPair>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }
}

/// Shared handle to the session. Anyone may read a snapshot; only
/// `SessionManager` writes.
#[derive(Clone, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<Session>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.read().current_user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().tokens.as_ref().map(|t| t.access.clone())
    }

    pub(crate) fn tokens(&self) -> Option<TokenPair> {
        self.read().tokens.clone()
    }

    pub(crate) fn establish(&self, user: User, tokens: TokenPair) {
        *self.write() = Session {
            current_user: Some(user),
            tokens: Some(tokens),
        };
    }

    /// Replace the user only while `access` is still the held token.
    /// Returns false if the session changed underneath the caller.
    pub(crate) fn replace_user_if(&self, access: &str, user: User) -> bool {
        let mut session = self.write();
        let still_current = session
            .tokens
            .as_ref()
            .is_some_and(|tokens| tokens.access == access);
        if still_current {
            session.current_user = Some(user);
        }
        still_current
    }

    pub(crate) fn clear(&self) {
        *self.write() = Session::default();
    }
}
