//! In-process stand-in for the REST backend, used by tests.
//!
//! Implements the endpoints the client consumes with in-memory state,
//! counts hits per route and can be told to fail specific calls.

use crate::{
    auth_response::AuthResponse,
    bulk_update_request::BulkUpdateRequest,
    bulk_update_response::BulkUpdateResponse,
    change_password_request::ChangePasswordRequest,
    create_task_request::CreateTaskRequest,
    login_request::LoginRequest,
    logout_request::LogoutRequest,
    page::Page,
    persist::MemoryCredentials,
    profile_update::ProfileUpdate,
    signup_request::SignupRequest,
    settings::Settings,
    task::Task,
    task_stats::TaskStats,
    task_status::TaskStatus,
    token_pair::TokenPair,
    update_task_request::UpdateTaskRequest,
    user::User,
    ClientContext,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct horse";

type Rejection = (StatusCode, Json<Value>);
type Shared = Arc<Mutex<World>>;

fn reject(status: StatusCode, detail: &str) -> Rejection {
    (status, Json(json!({ "detail": detail })))
}

fn field_error(field: &str, message: &str) -> Rejection {
    let mut body = serde_json::Map::new();
    body.insert(field.to_string(), json!([message]));
    (StatusCode::BAD_REQUEST, Json(Value::Object(body)))
}

// ── State ──────────────────────────────────────────────────────

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
pub struct World {
    accounts: BTreeMap<i64, Account>,
    access: HashMap<String, i64>,
    refresh: HashMap<String, i64>,
    tasks: BTreeMap<i64, Task>,
    next_id: i64,
    hits: HashMap<&'static str, usize>,
    logout_fails: bool,
    list_failures: u32,
}

impl World {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn hit(&mut self, route: &'static str) {
        *self.hits.entry(route).or_default() += 1;
    }

    fn add_account(&mut self, email: &str, password: &str) -> User {
        let id = self.next_id();
        let user = User {
            id,
            username: email.split('@').next().unwrap_or(email).to_string(),
            email: email.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            is_verified: true,
            created_at: Utc::now(),
        };
        self.accounts.insert(
            id,
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    fn issue_tokens(&mut self, user_id: i64) -> TokenPair {
        let n = self.next_id();
        let tokens = TokenPair {
            access: format!("access-{user_id}-{n}"),
            refresh: format!("refresh-{user_id}-{n}"),
        };
        self.access.insert(tokens.access.clone(), user_id);
        self.refresh.insert(tokens.refresh.clone(), user_id);
        tokens
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<i64, Rejection> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| {
                reject(StatusCode::UNAUTHORIZED, "Authentication credentials were not provided.")
            })?;

        self.access
            .get(token)
            .copied()
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Given token not valid for any token type"))
    }

    fn owned_task(&mut self, user_id: i64, id: i64) -> Result<&mut Task, Rejection> {
        self.tasks
            .get_mut(&id)
            .filter(|task| task.user_id == user_id)
            .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Not found."))
    }
}

/// Server-side save rules: `completed_at` follows the status.
fn apply_update(task: &mut Task, update: &UpdateTaskRequest) {
    if let Some(title) = &update.title {
        task.title = title.clone();
    }
    if let Some(description) = &update.description {
        task.description = description.clone();
    }
    if let Some(priority) = update.priority {
        task.priority = priority;
    }
    if let Some(status) = update.status {
        task.status = status;
    }
    if let Some(due_date) = update.due_date {
        task.due_date = Some(due_date);
    }
    stamp(task);
}

/// Server-side view of a profile patch: unset fields keep their value.
fn edit_user(user: User, update: ProfileUpdate) -> User {
    User {
        username: update.username.unwrap_or(user.username),
        email: update.email.unwrap_or(user.email),
        first_name: update.first_name.unwrap_or(user.first_name),
        last_name: update.last_name.unwrap_or(user.last_name),
        ..user
    }
}

fn stamp(task: &mut Task) {
    let now = Utc::now();
    match (task.status, task.completed_at) {
        (TaskStatus::Done, None) => task.completed_at = Some(now),
        (status, Some(_)) if status != TaskStatus::Done => task.completed_at = None,
        _ => {}
    }
    task.updated_at = now;
}

// ── Handle ─────────────────────────────────────────────────────

pub struct FakeBackend {
    addr: SocketAddr,
    world: Shared,
}

impl FakeBackend {
    /// Bind an ephemeral port and serve in a background task. One account
    /// (`EMAIL` / `PASSWORD`) exists from the start.
    pub async fn start() -> FakeBackend {
        let world: Shared = Arc::default();
        world.lock().unwrap().add_account(EMAIL, PASSWORD);

        let app = Router::new()
            .route("/api/auth/login/", post(login))
            .route("/api/auth/register/", post(register))
            .route("/api/auth/logout/", post(logout))
            .route("/api/auth/profile/", get(profile).patch(update_profile))
            .route("/api/auth/change-password/", post(change_password))
            .route("/api/tasks/", get(list_tasks).post(create_task))
            .route("/api/tasks/stats/", get(task_stats))
            .route("/api/tasks/bulk-update/", post(bulk_update))
            .route(
                "/api/tasks/:id/",
                get(get_task).patch(update_task).delete(delete_task),
            )
            .with_state(world.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeBackend { addr, world }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Settings pointing at this server: long staleness, fast retries.
    pub fn settings(&self) -> Settings {
        Settings {
            api_base_url: self.url(),
            stale_after_secs: 300,
            list_retry_delay_ms: 10,
            ..Settings::default()
        }
    }

    /// A context over `store`, not yet hydrated or logged in.
    pub fn context(&self, store: MemoryCredentials) -> ClientContext {
        ClientContext::with_store(self.settings(), Arc::new(store)).unwrap()
    }

    /// A context already logged in as the seeded account.
    pub async fn logged_in(&self) -> ClientContext {
        let ctx = self.context(MemoryCredentials::new());
        ctx.session.login(EMAIL, PASSWORD).await.unwrap();
        ctx
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap()
    }

    pub fn hits(&self, route: &'static str) -> usize {
        self.world().hits.get(route).copied().unwrap_or(0)
    }

    pub fn fail_logout(&self) {
        self.world().logout_fails = true;
    }

    /// The next `n` list requests answer 503.
    pub fn fail_next_lists(&self, n: u32) {
        self.world().list_failures = n;
    }

    /// Invalidate every issued access token, as if they all expired.
    pub fn expire_tokens(&self) {
        self.world().access.clear();
    }

    pub fn is_refresh_token_live(&self, refresh: &str) -> bool {
        self.world().refresh.contains_key(refresh)
    }

    /// Tokens for the seeded account, bypassing the login endpoint.
    pub fn issue_tokens_for_seeded_user(&self) -> TokenPair {
        let mut world = self.world();
        let id = world
            .accounts
            .values()
            .find(|account| account.user.email == EMAIL)
            .map(|account| account.user.id)
            .unwrap();
        world.issue_tokens(id)
    }
}

// ── Auth handlers ──────────────────────────────────────────────

async fn login(
    State(world): State<Shared>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("login");

    let user = world
        .accounts
        .values()
        .find(|account| account.user.email == payload.email && account.password == payload.password)
        .map(|account| account.user.clone())
        .ok_or_else(|| {
            reject(StatusCode::UNAUTHORIZED, "No active account found with the given credentials")
        })?;

    let tokens = world.issue_tokens(user.id);
    Ok(Json(AuthResponse { user, tokens }))
}

async fn register(
    State(world): State<Shared>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("register");

    if !payload.passwords_match() {
        return Err(field_error("password_confirm", "Passwords do not match."));
    }
    if world.accounts.values().any(|account| account.user.email == payload.email) {
        return Err(field_error("email", "user with this email already exists."));
    }

    let mut user = world.add_account(&payload.email, &payload.password);
    user.username = payload.username.clone();
    user.first_name = payload.first_name.clone();
    user.last_name = payload.last_name.clone();
    if let Some(account) = world.accounts.get_mut(&user.id) {
        account.user = user.clone();
    }

    let tokens = world.issue_tokens(user.id);
    Ok((StatusCode::CREATED, Json(AuthResponse { user, tokens })))
}

async fn logout(
    State(world): State<Shared>,
    headers: HeaderMap,
    Json(payload): Json<LogoutRequest>,
) -> Result<StatusCode, Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("logout");

    if world.logout_fails {
        return Err(reject(StatusCode::INTERNAL_SERVER_ERROR, "blacklist unavailable"));
    }
    let user_id = world.authenticate(&headers)?;
    world.refresh.remove(&payload.refresh);
    world.access.retain(|_, owner| *owner != user_id);
    Ok(StatusCode::RESET_CONTENT)
}

async fn profile(State(world): State<Shared>, headers: HeaderMap) -> Result<Json<User>, Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("profile");

    let user_id = world.authenticate(&headers)?;
    Ok(Json(world.accounts[&user_id].user.clone()))
}

async fn update_profile(
    State(world): State<Shared>,
    headers: HeaderMap,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<User>, Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("update_profile");

    let user_id = world.authenticate(&headers)?;
    if payload.email.as_deref().is_some_and(|email| !email.contains('@')) {
        return Err(field_error("email", "Enter a valid email address."));
    }
    let account = world
        .accounts
        .get_mut(&user_id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Not found."))?;
    account.user = edit_user(account.user.clone(), payload);
    Ok(Json(account.user.clone()))
}

async fn change_password(
    State(world): State<Shared>,
    headers: HeaderMap,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("change_password");

    let user_id = world.authenticate(&headers)?;
    if payload.new_password != payload.new_password_confirm {
        return Err(field_error("new_password_confirm", "Passwords do not match."));
    }
    let account = world
        .accounts
        .get_mut(&user_id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Not found."))?;
    if account.password != payload.old_password {
        return Err(field_error("old_password", "Wrong password."));
    }
    account.password = payload.new_password;
    Ok(Json(json!({ "detail": "Password changed successfully." })))
}

// ── Task handlers ──────────────────────────────────────────────

async fn list_tasks(
    State(world): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Task>>, Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("list");

    if world.list_failures > 0 {
        world.list_failures -= 1;
        return Err(reject(StatusCode::SERVICE_UNAVAILABLE, "try again"));
    }
    let user_id = world.authenticate(&headers)?;

    let search = params.get("search").map(|s| s.to_lowercase());
    let mut results: Vec<Task> = world
        .tasks
        .values()
        .filter(|task| task.user_id == user_id)
        .filter(|task| params.get("status").map_or(true, |s| task.status.as_str() == s))
        .filter(|task| params.get("priority").map_or(true, |p| task.priority.as_str() == p))
        .filter(|task| {
            search.as_ref().map_or(true, |needle| {
                task.title.to_lowercase().contains(needle)
                    || task.description.to_lowercase().contains(needle)
            })
        })
        .cloned()
        .collect();

    match params.get("ordering").map(String::as_str).unwrap_or("-created_at") {
        "created_at" => results.sort_by_key(|task| task.id),
        "priority" => results.sort_by_key(|task| task.priority),
        "-priority" => results.sort_by_key(|task| std::cmp::Reverse(task.priority)),
        "due_date" => results.sort_by_key(|task| task.due_date),
        _ => results.sort_by_key(|task| std::cmp::Reverse(task.id)),
    }

    Ok(Json(Page {
        count: results.len() as u64,
        results,
        next: None,
        previous: None,
    }))
}

async fn create_task(
    State(world): State<Shared>,
    headers: HeaderMap,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("create");

    let user_id = world.authenticate(&headers)?;
    if payload.title.trim().is_empty() {
        return Err(field_error("title", "This field may not be blank."));
    }

    let now = Utc::now();
    let mut task = Task {
        id: world.next_id(),
        title: payload.title,
        description: payload.description.unwrap_or_default(),
        user_id,
        priority: payload.priority.unwrap_or_default(),
        status: payload.status.unwrap_or_default(),
        due_date: payload.due_date,
        created_at: now,
        updated_at: now,
        completed_at: None,
    };
    stamp(&mut task);
    world.tasks.insert(task.id, task.clone());
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(world): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Task>, Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("get");

    let user_id = world.authenticate(&headers)?;
    Ok(Json(world.owned_task(user_id, id)?.clone()))
}

async fn update_task(
    State(world): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("update");

    let user_id = world.authenticate(&headers)?;
    if payload.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
        return Err(field_error("title", "This field may not be blank."));
    }
    let task = world.owned_task(user_id, id)?;
    apply_update(task, &payload);
    Ok(Json(task.clone()))
}

async fn delete_task(
    State(world): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("delete");

    let user_id = world.authenticate(&headers)?;
    world.owned_task(user_id, id)?;
    world.tasks.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

async fn task_stats(State(world): State<Shared>, headers: HeaderMap) -> Result<Json<TaskStats>, Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("stats");

    let user_id = world.authenticate(&headers)?;
    let now = Utc::now();
    let mine: Vec<&Task> = world.tasks.values().filter(|task| task.user_id == user_id).collect();
    let count = |status: TaskStatus| mine.iter().filter(|task| task.status == status).count() as u64;

    Ok(Json(TaskStats {
        total_tasks: mine.len() as u64,
        todo_tasks: count(TaskStatus::Todo),
        in_progress_tasks: count(TaskStatus::InProgress),
        done_tasks: count(TaskStatus::Done),
        overdue_tasks: mine
            .iter()
            .filter(|task| task.status.is_open() && task.is_overdue(now))
            .count() as u64,
    }))
}

async fn bulk_update(
    State(world): State<Shared>,
    headers: HeaderMap,
    Json(payload): Json<BulkUpdateRequest>,
) -> Result<Json<BulkUpdateResponse>, Rejection> {
    let mut world = world.lock().unwrap();
    world.hit("bulk_update");

    let user_id = world.authenticate(&headers)?;
    if payload.task_ids.is_empty() || payload.updates.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "task_ids and updates are required" })),
        ));
    }

    let mut updated_count = 0;
    for task in world.tasks.values_mut() {
        if task.user_id == user_id && payload.task_ids.contains(&task.id) {
            apply_update(task, &payload.updates);
            updated_count += 1;
        }
    }
    if updated_count == 0 {
        return Err((StatusCode::NOT_FOUND, Json(json!({ "error": "No tasks found" }))));
    }

    Ok(Json(BulkUpdateResponse {
        message: format!("Updated {updated_count} tasks"),
        updated_count,
    }))
}
