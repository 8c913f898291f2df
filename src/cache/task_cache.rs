//! Task data cache.
//!
//! Three query caches front the task endpoints: list results keyed by the
//! normalized filters, single tasks keyed by id, and the one stats
//! slot. Reads are stale-while-revalidate. Every successful mutation drops
//! all list results and the stats, plus the touched task entries.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    api::ApiClient,
    bulk_update_request::BulkUpdateRequest,
    bulk_update_response::BulkUpdateResponse,
    cache::query_cache::{Lookup, QueryCache},
    create_task_request::CreateTaskRequest,
    error::ClientError,
    page::Page,
    session::state::SharedSession,
    settings::Settings,
    task::Task,
    task_filters::TaskFilters,
    task_stats::TaskStats,
    update_task_request::UpdateTaskRequest,
};

/// Retries for the first (blocking) list fetch of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        attempts: 0,
        delay: Duration::ZERO,
    };
}

#[derive(Clone)]
pub struct TaskCache {
    api: ApiClient,
    session: SharedSession,
    lists: QueryCache<TaskFilters, Page<Task>>,
    tasks: QueryCache<i64, Task>,
    stats: QueryCache<(), TaskStats>,
    list_retry: RetryPolicy,
}

impl TaskCache {
    pub fn new(
        api: ApiClient,
        session: SharedSession,
        stale_after: Duration,
        list_retry: RetryPolicy,
    ) -> Self {
        Self {
            api,
            session,
            lists: QueryCache::new(stale_after),
            tasks: QueryCache::new(stale_after),
            stats: QueryCache::new(stale_after),
            list_retry,
        }
    }

    pub fn from_settings(api: ApiClient, session: SharedSession, settings: &Settings) -> Self {
        let retry = RetryPolicy {
            attempts: settings.list_retry_attempts,
            delay: settings.list_retry_delay(),
        };
        Self::new(api, session, settings.stale_after(), retry)
    }

    fn token(&self) -> Result<String, ClientError> {
        self.session.access_token().ok_or_else(ClientError::not_logged_in)
    }

    // ── Reads ──────────────────────────────────────────────────

    pub async fn list_tasks(&self, filters: &TaskFilters) -> Result<Arc<Page<Task>>, ClientError> {
        let filters = filters.normalized();
        let key = filters.clone();
        let fetch = move |api: ApiClient, token: String| {
            let filters = filters.clone();
            async move { api.list_tasks(&token, &filters).await }
        };
        self.read(&self.lists, key, fetch, self.list_retry).await
    }

    /// Fails with `NotFound` when the task does not exist or belongs to
    /// someone else.
    pub async fn get_task(&self, id: i64) -> Result<Arc<Task>, ClientError> {
        let fetch = move |api: ApiClient, token: String| async move { api.get_task(&token, id).await };
        self.read(&self.tasks, id, fetch, RetryPolicy::NONE).await
    }

    pub async fn get_stats(&self) -> Result<Arc<TaskStats>, ClientError> {
        let fetch = |api: ApiClient, token: String| async move { api.task_stats(&token).await };
        self.read(&self.stats, (), fetch, RetryPolicy::NONE).await
    }

    async fn read<K, V, F, Fut>(
        &self,
        cache: &QueryCache<K, V>,
        key: K,
        fetch: F,
        retry: RetryPolicy,
    ) -> Result<Arc<V>, ClientError>
    where
        K: Eq + Hash + Clone + Debug + Send + 'static,
        V: Send + Sync + 'static,
        F: Fn(ApiClient, String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, ClientError>> + Send + 'static,
    {
        let token = self.token()?;

        match cache.lookup(&key) {
            Lookup::Fresh(value) => return Ok(value),
            Lookup::Stale(value) => {
                self.refresh_in_background(cache, key, fetch, token);
                return Ok(value);
            }
            Lookup::Missing => {}
        }

        let ticket = cache.begin(key.clone());
        let mut attempt = 0;
        let value = loop {
            match fetch(self.api.clone(), token.clone()).await {
                Ok(value) => break Arc::new(value),
                Err(e) if attempt < retry.attempts && e.is_retryable() => {
                    attempt += 1;
                    tracing::warn!(?key, attempt, error = %e, "fetch failed, retrying");
                    tokio::time::sleep(retry.delay).await;
                }
                Err(e) => {
                    cache.abandon(&key, ticket);
                    return Err(e);
                }
            }
        };

        if !cache.complete(&key, ticket, Arc::clone(&value)) {
            tracing::debug!(?key, "response superseded, not cached");
        }
        Ok(value)
    }

    fn refresh_in_background<K, V, F, Fut>(&self, cache: &QueryCache<K, V>, key: K, fetch: F, token: String)
    where
        K: Eq + Hash + Clone + Debug + Send + 'static,
        V: Send + Sync + 'static,
        F: Fn(ApiClient, String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, ClientError>> + Send + 'static,
    {
        let Some(ticket) = cache.begin_refresh(&key) else {
            return;
        };

        let cache = cache.clone();
        let api = self.api.clone();
        tokio::spawn(async move {
            match fetch(api, token).await {
                Ok(value) => {
                    cache.complete(&key, ticket, Arc::new(value));
                }
                Err(e) => {
                    tracing::warn!(?key, error = %e, "background refresh failed");
                    cache.abandon(&key, ticket);
                }
            }
        });
    }

    // ── Mutations ──────────────────────────────────────────────

    /// A new task may match any filter and shifts every count.
    pub async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task, ClientError> {
        let token = self.token()?;
        let task = self.api.create_task(&token, request).await?;

        self.invalidate_collections();
        tracing::info!(task_id = task.id, "task created");
        Ok(task)
    }

    pub async fn update_task(&self, id: i64, request: &UpdateTaskRequest) -> Result<Task, ClientError> {
        let token = self.token()?;
        let task = self.api.update_task(&token, id, request).await?;

        self.tasks.invalidate(&id);
        self.invalidate_collections();
        tracing::info!(task_id = id, "task updated");
        Ok(task)
    }

    pub async fn delete_task(&self, id: i64) -> Result<(), ClientError> {
        let token = self.token()?;
        self.api.delete_task(&token, id).await?;

        self.tasks.invalidate(&id);
        self.invalidate_collections();
        tracing::info!(task_id = id, "task deleted");
        Ok(())
    }

    /// Same footprint as `update_task`, applied once for the whole batch.
    pub async fn bulk_update(
        &self,
        ids: &[i64],
        updates: &UpdateTaskRequest,
    ) -> Result<BulkUpdateResponse, ClientError> {
        let token = self.token()?;
        let request = BulkUpdateRequest {
            task_ids: ids.to_vec(),
            updates: updates.clone(),
        };
        let response = self.api.bulk_update(&token, &request).await?;

        for id in ids {
            self.tasks.invalidate(id);
        }
        self.invalidate_collections();
        tracing::info!(requested = ids.len(), updated = response.updated_count, "tasks bulk updated");
        Ok(response)
    }

    fn invalidate_collections(&self) {
        self.lists.invalidate_all();
        self.stats.invalidate_all();
    }

    /// Drop everything; the data belonged to the departing identity.
    pub fn clear(&self) {
        self.lists.invalidate_all();
        self.tasks.invalidate_all();
        self.stats.invalidate_all();
    }

    pub fn is_list_cached(&self, filters: &TaskFilters) -> bool {
        self.lists.is_cached(&filters.normalized())
    }

    pub fn is_task_cached(&self, id: i64) -> bool {
        self.tasks.is_cached(&id)
    }

    pub fn is_stats_cached(&self) -> bool {
        self.stats.is_cached(&())
    }
}
