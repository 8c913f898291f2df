//! REST transport for the task backend.
//!
//! One method per endpoint, all under `/api`. Authenticated calls take the
//! access token explicitly; the transport holds no session state.

use crate::{
    auth_response::AuthResponse,
    bulk_update_request::BulkUpdateRequest,
    bulk_update_response::BulkUpdateResponse,
    change_password_request::ChangePasswordRequest,
    create_task_request::CreateTaskRequest,
    error::{ClientError, FieldErrors},
    login_request::LoginRequest,
    logout_request::LogoutRequest,
    page::Page,
    profile_update::ProfileUpdate,
    settings::Settings,
    signup_request::SignupRequest,
    task::Task,
    task_filters::TaskFilters,
    task_stats::TaskStats,
    update_task_request::UpdateTaskRequest,
    user::User,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Instant;

// ── Endpoints ──────────────────────────────────────────────────

/// Which call a response belongs to. Decides the generic fallback message
/// and how a 401 is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Register,
    Logout,
    Profile,
    UpdateProfile,
    ChangePassword,
    ListTasks,
    GetTask,
    CreateTask,
    UpdateTask,
    DeleteTask,
    TaskStats,
    BulkUpdate,
}

impl Endpoint {
    pub fn fallback(&self) -> &'static str {
        match self {
            Endpoint::Login => "Login failed",
            Endpoint::Register => "Signup failed",
            Endpoint::Logout => "Logout failed",
            Endpoint::Profile => "Failed to load profile",
            Endpoint::UpdateProfile => "Profile update failed",
            Endpoint::ChangePassword => "Password change failed",
            Endpoint::ListTasks => "Failed to load tasks",
            Endpoint::GetTask => "Failed to load task",
            Endpoint::CreateTask => "Failed to create task",
            Endpoint::UpdateTask => "Failed to update task",
            Endpoint::DeleteTask => "Failed to delete task",
            Endpoint::TaskStats => "Failed to load task statistics",
            Endpoint::BulkUpdate => "Failed to update tasks",
        }
    }

    /// Endpoints where a 401 means "wrong credentials", not "session expired".
    fn takes_credentials(&self) -> bool {
        matches!(self, Endpoint::Login | Endpoint::Register)
    }
}

// ── Client ─────────────────────────────────────────────────────

/// Cloneable (the reqwest client is an Arc inside).
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| ClientError::Unknown {
            status: None,
            message: format!("cannot build HTTP client: {e}"),
        })?;

        Ok(Self {
            http,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}/api{}", self.base_url, path));
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn dispatch(
        &self,
        builder: RequestBuilder,
        endpoint: Endpoint,
    ) -> Result<Response, ClientError> {
        let started = Instant::now();
        let response = builder.send().await.map_err(|e| {
            tracing::debug!(?endpoint, error = %e, "request failed before a response");
            ClientError::Network(e.to_string())
        })?;

        let status = response.status();
        tracing::debug!(
            ?endpoint,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "response"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(status, &body, endpoint))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        endpoint: Endpoint,
    ) -> Result<T, ClientError> {
        let response = self.dispatch(builder, endpoint).await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Unknown {
            status: Some(status.as_u16()),
            message: format!("{}: unexpected response body ({e})", endpoint.fallback()),
        })
    }

    async fn send_empty(&self, builder: RequestBuilder, endpoint: Endpoint) -> Result<(), ClientError> {
        self.dispatch(builder, endpoint).await.map(|_| ())
    }

    // ── Auth ───────────────────────────────────────────────────

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let builder = self.request(Method::POST, "/auth/login/", None).json(request);
        self.send(builder, Endpoint::Login).await
    }

    pub async fn register(&self, request: &SignupRequest) -> Result<AuthResponse, ClientError> {
        let builder = self.request(Method::POST, "/auth/register/", None).json(request);
        self.send(builder, Endpoint::Register).await
    }

    pub async fn logout(&self, token: Option<&str>, refresh: &str) -> Result<(), ClientError> {
        let body = LogoutRequest {
            refresh: refresh.to_string(),
        };
        let builder = self.request(Method::POST, "/auth/logout/", token).json(&body);
        self.send_empty(builder, Endpoint::Logout).await
    }

    pub async fn profile(&self, token: &str) -> Result<User, ClientError> {
        let builder = self.request(Method::GET, "/auth/profile/", Some(token));
        self.send(builder, Endpoint::Profile).await
    }

    pub async fn update_profile(&self, token: &str, update: &ProfileUpdate) -> Result<User, ClientError> {
        let builder = self.request(Method::PATCH, "/auth/profile/", Some(token)).json(update);
        self.send(builder, Endpoint::UpdateProfile).await
    }

    pub async fn change_password(
        &self,
        token: &str,
        request: &ChangePasswordRequest,
    ) -> Result<(), ClientError> {
        let builder = self
            .request(Method::POST, "/auth/change-password/", Some(token))
            .json(request);
        self.send_empty(builder, Endpoint::ChangePassword).await
    }

    // ── Tasks ──────────────────────────────────────────────────

    pub async fn list_tasks(&self, token: &str, filters: &TaskFilters) -> Result<Page<Task>, ClientError> {
        let builder = self
            .request(Method::GET, "/tasks/", Some(token))
            .query(&filters.params());
        self.send(builder, Endpoint::ListTasks).await
    }

    pub async fn get_task(&self, token: &str, id: i64) -> Result<Task, ClientError> {
        let builder = self.request(Method::GET, &format!("/tasks/{id}/"), Some(token));
        self.send(builder, Endpoint::GetTask).await
    }

    pub async fn create_task(&self, token: &str, request: &CreateTaskRequest) -> Result<Task, ClientError> {
        let builder = self.request(Method::POST, "/tasks/", Some(token)).json(request);
        self.send(builder, Endpoint::CreateTask).await
    }

    pub async fn update_task(
        &self,
        token: &str,
        id: i64,
        request: &UpdateTaskRequest,
    ) -> Result<Task, ClientError> {
        let builder = self
            .request(Method::PATCH, &format!("/tasks/{id}/"), Some(token))
            .json(request);
        self.send(builder, Endpoint::UpdateTask).await
    }

    pub async fn delete_task(&self, token: &str, id: i64) -> Result<(), ClientError> {
        let builder = self.request(Method::DELETE, &format!("/tasks/{id}/"), Some(token));
        self.send_empty(builder, Endpoint::DeleteTask).await
    }

    pub async fn task_stats(&self, token: &str) -> Result<TaskStats, ClientError> {
        let builder = self.request(Method::GET, "/tasks/stats/", Some(token));
        self.send(builder, Endpoint::TaskStats).await
    }

    pub async fn bulk_update(
        &self,
        token: &str,
        request: &BulkUpdateRequest,
    ) -> Result<BulkUpdateResponse, ClientError> {
        let builder = self
            .request(Method::POST, "/tasks/bulk-update/", Some(token))
            .json(request);
        self.send(builder, Endpoint::BulkUpdate).await
    }
}

// ── Error mapping ──────────────────────────────────────────────

/// Classify a non-2xx response and pick the message to surface:
/// `detail`, then `error`, then `message`, then field errors, then the
/// endpoint's fallback.
pub fn error_from_response(status: StatusCode, body: &str, endpoint: Endpoint) -> ClientError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let fields = parsed.as_ref().map(field_errors).unwrap_or_default();

    let message = parsed
        .as_ref()
        .and_then(|value| {
            ["detail", "error", "message"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str))
                .map(str::to_string)
        })
        .or_else(|| flatten_fields(&fields))
        .unwrap_or_else(|| endpoint.fallback().to_string());

    match status {
        StatusCode::BAD_REQUEST => ClientError::Validation { message, fields },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN if endpoint.takes_credentials() => {
            ClientError::Authentication(message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        other => ClientError::Unknown {
            status: Some(other.as_u16()),
            message,
        },
    }
}

fn field_errors(value: &Value) -> FieldErrors {
    let Some(object) = value.as_object() else {
        return FieldErrors::new();
    };

    object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "detail" | "error" | "message"))
        .filter_map(|(key, value)| {
            let messages: Vec<String> = match value {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => Vec::new(),
            };
            (!messages.is_empty()).then(|| (key.clone(), messages))
        })
        .collect()
}

fn flatten_fields(fields: &FieldErrors) -> Option<String> {
    if fields.is_empty() {
        return None;
    }
    let parts: Vec<String> = fields
        .iter()
        .map(|(field, messages)| {
            let joined = messages.join(" ");
            if field == "non_field_errors" {
                joined
            } else {
                format!("{field}: {joined}")
            }
        })
        .collect();
    Some(parts.join("; "))
}
