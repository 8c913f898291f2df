//! Login, signup, logout and profile operations.
//!
//! `SessionManager` is the only writer of the session and of the persisted
//! credentials. A failed operation leaves both exactly as they were.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{
    api::ApiClient,
    auth_response::AuthResponse,
    cache::task_cache::TaskCache,
    change_password_request::ChangePasswordRequest,
    error::ClientError,
    login_request::LoginRequest,
    persist::CredentialStore,
    profile_update::ProfileUpdate,
    session::state::{Session, SharedSession},
    signup_request::SignupRequest,
    user::User,
};

struct Inner {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    session: SharedSession,
    tasks: TaskCache,
    hydrated: AtomicBool,
}

/// Cloneable handle; clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        api: ApiClient,
        store: Arc<dyn CredentialStore>,
        session: SharedSession,
        tasks: TaskCache,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                store,
                session,
                tasks,
                hydrated: AtomicBool::new(false),
            }),
        }
    }

    // ── Reads ──────────────────────────────────────────────────

    pub fn current_user(&self) -> Option<User> {
        self.inner.session.current_user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.is_authenticated()
    }

    pub fn snapshot(&self) -> Session {
        self.inner.session.snapshot()
    }

    pub fn shared(&self) -> &SharedSession {
        &self.inner.session
    }

    /// False until `hydrate` has run; views should hold off routing until then.
    pub fn is_hydrated(&self) -> bool {
        self.inner.hydrated.load(Ordering::Acquire)
    }

    // ── Operations ─────────────────────────────────────────────

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.inner.api.login(&request).await.inspect_err(|e| {
            tracing::info!(error = %e, "login rejected");
        })?;
        self.establish(response)
    }

    /// Password confirmation is the caller's check (`passwords_match`);
    /// the server validates again.
    pub async fn signup(&self, request: &SignupRequest) -> Result<User, ClientError> {
        let response = self.inner.api.register(request).await.inspect_err(|e| {
            tracing::info!(error = %e, "signup rejected");
        })?;
        self.establish(response)
    }

    /// Persist first, then publish. A store failure leaves the session untouched.
    fn establish(&self, response: AuthResponse) -> Result<User, ClientError> {
        let AuthResponse { user, tokens } = response;
        self.inner.store.save(&tokens)?;
        // A fresh identity must not see data cached for the previous one.
        self.inner.tasks.clear();
        self.inner.session.establish(user.clone(), tokens);
        tracing::info!(user_id = user.id, username = %user.username, "session established");
        Ok(user)
    }

    /// Always succeeds locally. The server-side token invalidation is
    /// best effort and its failure is only logged.
    pub async fn logout(&self) {
        if let Some(tokens) = self.inner.session.tokens() {
            if let Err(e) = self
                .inner
                .api
                .logout(Some(&tokens.access), &tokens.refresh)
                .await
            {
                tracing::warn!(error = %e, "server logout failed, clearing locally");
            }
        }
        self.clear_local();
        tracing::info!("logged out");
    }

    /// Drop the session without talking to the server. Used when a call
    /// reports the token as no longer valid.
    pub fn expire(&self) {
        if self.inner.session.tokens().is_some() {
            tracing::info!("session expired");
        }
        self.clear_local();
    }

    fn clear_local(&self) {
        if let Err(e) = self.inner.store.clear() {
            tracing::error!(error = %e, "failed to clear stored credentials");
        }
        self.inner.session.clear();
        self.inner.tasks.clear();
    }

    /// Run once at startup. A stored token is checked by fetching the
    /// profile; any failure discards the stored credentials. No retry.
    pub async fn hydrate(&self) {
        let stored = match self.inner.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable stored credentials, discarding");
                self.clear_local();
                None
            }
        };

        if let Some(tokens) = stored {
            match self.inner.api.profile(&tokens.access).await {
                Ok(user) => {
                    tracing::info!(user_id = user.id, "session restored");
                    self.inner.session.establish(user, tokens);
                }
                Err(e) => {
                    tracing::info!(error = %e, "stored token rejected, clearing");
                    self.clear_local();
                }
            }
        }

        self.inner.hydrated.store(true, Ordering::Release);
    }

    /// The server's response replaces the cached user wholesale.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ClientError> {
        let access = self
            .inner
            .session
            .access_token()
            .ok_or_else(ClientError::not_logged_in)?;

        let user = self.inner.api.update_profile(&access, update).await?;

        if !self.inner.session.replace_user_if(&access, user.clone()) {
            tracing::debug!("session changed during profile update, result dropped");
            return Err(ClientError::not_logged_in());
        }
        tracing::info!(user_id = user.id, "profile updated");
        Ok(user)
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ClientError> {
        let access = self
            .inner
            .session
            .access_token()
            .ok_or_else(ClientError::not_logged_in)?;

        self.inner.api.change_password(&access, request).await?;
        tracing::info!("password changed");
        Ok(())
    }
}
