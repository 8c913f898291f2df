//! The object views are handed instead of reaching for globals.

use std::sync::Arc;

use crate::{
    api::ApiClient,
    cache::task_cache::TaskCache,
    error::ClientError,
    persist::{CredentialFile, CredentialStore},
    session::{manager::SessionManager, state::SharedSession},
    settings::Settings,
    shell::Route,
};

#[derive(Clone)]
pub struct ClientContext {
    pub settings: Settings,
    pub session: SessionManager,
    pub tasks: TaskCache,
}

impl ClientContext {
    /// Wire everything against the redb credentials file from `settings`.
    pub fn open(settings: Settings) -> Result<Self, ClientError> {
        let store = CredentialFile::open(&settings.credentials_path)?;
        Self::with_store(settings, Arc::new(store))
    }

    pub fn with_store(settings: Settings, store: Arc<dyn CredentialStore>) -> Result<Self, ClientError> {
        let api = ApiClient::from_settings(&settings)?;
        let shared = SharedSession::new();
        let tasks = TaskCache::from_settings(api.clone(), shared.clone(), &settings);
        let session = SessionManager::new(api, store, shared, tasks.clone());

        Ok(Self {
            settings,
            session,
            tasks,
        })
    }

    /// Pass a result through, dropping the session first if the backend
    /// said the token is no longer valid.
    pub fn guard<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(e) = &result {
            if e.is_unauthorized() {
                self.session.expire();
            }
        }
        result
    }

    /// Where a request for `path` should land given the current session.
    pub fn route(&self, path: &str) -> Route {
        Route::parse(path).resolve(self.session.is_authenticated())
    }
}
