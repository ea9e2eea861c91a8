//! In-process mock of the task store API, for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use taskdesk_core::task::{Assignee, ChecklistItem, Priority, Status, Task};
use taskdesk_core::user::{CreateUser, LoginRequest, RegisterUser, Role, User};
use taskdesk_core::StatusSummary;
use tokio::net::TcpListener;

type ApiError = (StatusCode, Json<Value>);

pub const ADMIN_EMAIL: &str = "admin@taskdesk.dev";
pub const ADMIN_PASSWORD: &str = "admin-pass";

#[derive(Default)]
struct StoreState {
    tasks: Vec<Task>,
    users: Vec<(User, String)>,
    tokens: HashMap<String, String>,
    require_auth: bool,
    fail_writes: bool,
    fail_reads: bool,
    echo_task: bool,
    write_delay: Option<Duration>,
    summary_override: Option<StatusSummary>,
    list_queries: Vec<Option<String>>,
    writes: Vec<(String, Vec<ChecklistItem>)>,
}

/// Shared state behind the mock router. Tests flip the switches to inject
/// failures and read back what the client sent.
pub struct MockStore {
    state: Mutex<StoreState>,
}

impl MockStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        let admin = User {
            id: "u-admin".into(),
            name: "Admin".into(),
            username: "admin".into(),
            email: ADMIN_EMAIL.into(),
            role: Role::Admin,
            bio: None,
            profile_image_url: None,
        };
        Self {
            state: Mutex::new(StoreState {
                tasks,
                users: vec![(admin, ADMIN_PASSWORD.into())],
                echo_task: true,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn set_require_auth(&self, require: bool) {
        self.lock().require_auth = require;
    }

    /// When false, checklist writes are acknowledged without a task body.
    pub fn set_echo_task(&self, echo: bool) {
        self.lock().echo_task = echo;
    }

    pub fn set_write_delay(&self, delay: Option<Duration>) {
        self.lock().write_delay = delay;
    }

    /// Report fixed counters regardless of the stored tasks.
    pub fn set_summary_override(&self, summary: Option<StatusSummary>) {
        self.lock().summary_override = summary;
    }

    /// `status` query values seen by `GET /tasks`, in arrival order.
    /// `None` means the parameter was absent.
    pub fn list_queries(&self) -> Vec<Option<String>> {
        self.lock().list_queries.clone()
    }

    /// Checklist writes that reached the store, in arrival order.
    pub fn writes(&self) -> Vec<(String, Vec<ChecklistItem>)> {
        self.lock().writes.clone()
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        self.lock().tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    fn summary(&self) -> StatusSummary {
        let state = self.lock();
        if let Some(summary) = state.summary_override {
            return summary;
        }
        let count = |s: Status| state.tasks.iter().filter(|t| t.status == s).count() as u64;
        StatusSummary {
            all: state.tasks.len() as u64,
            pending_tasks: count(Status::Pending),
            in_progress_tasks: count(Status::InProgress),
            completed_tasks: count(Status::Completed),
        }
    }

    fn check_auth(&self, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
        let state = self.lock();
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let user = token
            .and_then(|t| state.tokens.get(t))
            .and_then(|uid| state.users.iter().find(|(u, _)| &u.id == uid))
            .map(|(u, _)| u.clone());
        if state.require_auth && user.is_none() {
            return Err(error(StatusCode::UNAUTHORIZED, "Not authorized, no token"));
        }
        Ok(user)
    }
}

/// A running mock server. `base_url` already includes the `/api` prefix.
pub struct TestServer {
    pub base_url: String,
    pub store: Arc<MockStore>,
    _handle: tokio::task::JoinHandle<()>,
}

pub fn router(store: Arc<MockStore>) -> Router {
    Router::new()
        .route("/api/tasks", get(list_tasks))
        .route("/api/tasks/{id}", get(get_task))
        .route("/api/tasks/{id}/todo", put(update_checklist))
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/profile", get(profile))
        .route("/api/users", post(create_user))
        .with_state(store)
}

/// Spawn the mock on a random port, seeded with [`sample_tasks`].
pub async fn spawn_test_server() -> TestServer {
    spawn_test_server_with(sample_tasks()).await
}

pub async fn spawn_test_server_with(tasks: Vec<Task>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let store = Arc::new(MockStore::new(tasks));
    let app = router(store.clone());
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url: format!("http://{addr}/api"),
        store,
        _handle: handle,
    }
}

pub fn make_task(id: &str, status: Status, checklist: Vec<ChecklistItem>) -> Task {
    let done = checklist.iter().filter(|c| c.completed).count() as u32;
    Task {
        id: id.to_string(),
        title: format!("Task {id}"),
        description: format!("Description of {id}"),
        priority: Priority::Medium,
        status,
        progress: progress_of(&checklist),
        created_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()),
        due_date: Some(Utc.with_ymd_and_hms(2025, 3, 5, 0, 0, 0).unwrap()),
        assigned_to: vec![Assignee {
            id: Some("u1".into()),
            name: Some("Sam".into()),
            email: None,
            profile_image_url: "https://img.example/u1.png".into(),
        }],
        attachments: vec!["example.com/doc".into(), "http://already.com".into()],
        checklist,
        completed_todo_count: Some(done),
    }
}

/// Three tasks: `t1` pending (A open, B done), `t2` in progress, `t3` completed.
pub fn sample_tasks() -> Vec<Task> {
    vec![
        make_task(
            "t1",
            Status::Pending,
            vec![ChecklistItem::new("A", false), ChecklistItem::new("B", true)],
        ),
        make_task(
            "t2",
            Status::InProgress,
            vec![
                ChecklistItem::new("Draft", true),
                ChecklistItem::new("Review", false),
                ChecklistItem::new("Ship", false),
            ],
        ),
        make_task("t3", Status::Completed, vec![ChecklistItem::new("Only", true)]),
    ]
}

fn progress_of(checklist: &[ChecklistItem]) -> f64 {
    if checklist.is_empty() {
        return 0.0;
    }
    let done = checklist.iter().filter(|c| c.completed).count() as f64;
    (done / checklist.len() as f64 * 100.0).round()
}

fn status_of(checklist: &[ChecklistItem]) -> Status {
    let done = checklist.iter().filter(|c| c.completed).count();
    if !checklist.is_empty() && done == checklist.len() {
        Status::Completed
    } else if done > 0 {
        Status::InProgress
    } else {
        Status::Pending
    }
}

fn error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "message": message })))
}

async fn list_tasks(
    State(store): State<Arc<MockStore>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    store.check_auth(&headers)?;
    let status = q.get("status").cloned();
    let tasks = {
        let mut state = store.lock();
        state.list_queries.push(status.clone());
        if state.fail_reads {
            return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Server error"));
        }
        let wanted = status.as_deref().and_then(Status::parse_str);
        state
            .tasks
            .iter()
            .filter(|t| wanted.map_or(true, |s| t.status == s))
            .cloned()
            .collect::<Vec<_>>()
    };
    let summary = store.summary();
    Ok(Json(json!({ "tasks": tasks, "statusSummary": summary })))
}

async fn get_task(
    State(store): State<Arc<MockStore>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    store.check_auth(&headers)?;
    let state = store.lock();
    if state.fail_reads {
        return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Server error"));
    }
    state
        .tasks
        .iter()
        .find(|t| t.id == id)
        .map(|t| Json(json!({ "task": t })))
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Task not found"))
}

#[derive(Deserialize)]
struct ChecklistBody {
    #[serde(rename = "todoCheckList")]
    checklist: Vec<ChecklistItem>,
}

async fn update_checklist(
    State(store): State<Arc<MockStore>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ChecklistBody>,
) -> Result<Json<Value>, ApiError> {
    store.check_auth(&headers)?;
    let delay = store.lock().write_delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let mut state = store.lock();
    state.writes.push((id.clone(), body.checklist.clone()));
    if state.fail_writes {
        return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Checklist update failed"));
    }
    let echo = state.echo_task;
    let task = state
        .tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Task not found"))?;
    task.completed_todo_count = Some(body.checklist.iter().filter(|c| c.completed).count() as u32);
    task.progress = progress_of(&body.checklist);
    task.status = status_of(&body.checklist);
    task.checklist = body.checklist;
    if echo {
        Ok(Json(json!({ "message": "Task checklist updated", "task": task })))
    } else {
        Ok(Json(json!({ "message": "Task checklist updated" })))
    }
}

async fn login(
    State(store): State<Arc<MockStore>>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut state = store.lock();
    let user = state
        .users
        .iter()
        .find(|(u, pw)| u.email == input.email && *pw == input.password)
        .map(|(u, _)| u.clone())
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Invalid email or password"))?;
    let token = uuid::Uuid::new_v4().to_string();
    state.tokens.insert(token.clone(), user.id.clone());
    Ok(Json(json!({ "token": token, "user": user, "message": "Login successful" })))
}

async fn register(
    State(store): State<Arc<MockStore>>,
    Json(input): Json<RegisterUser>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut state = store.lock();
    if state.users.iter().any(|(u, _)| u.email == input.email) {
        return Err(error(StatusCode::BAD_REQUEST, "User already exists"));
    }
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: input.name,
        username: input.username,
        email: input.email,
        role: Role::Member,
        bio: Some(input.bio).filter(|b| !b.is_empty()),
        profile_image_url: Some(input.profile_image_url).filter(|p| !p.is_empty()),
    };
    state.users.push((user.clone(), input.password));
    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": user, "message": "User registered successfully" })),
    ))
}

async fn profile(
    State(store): State<Arc<MockStore>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    match store.check_auth(&headers)? {
        Some(user) => Ok(Json(json!(user))),
        None => Err(error(StatusCode::UNAUTHORIZED, "Not authorized, no token")),
    }
}

async fn create_user(
    State(store): State<Arc<MockStore>>,
    headers: HeaderMap,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let caller = store.check_auth(&headers)?;
    if !caller.is_some_and(|u| u.role == Role::Admin) {
        return Err(error(StatusCode::FORBIDDEN, "Access denied, admin only"));
    }
    let mut state = store.lock();
    if state.users.iter().any(|(u, _)| u.email == input.email) {
        return Err(error(StatusCode::BAD_REQUEST, "User already exists"));
    }
    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        name: input.name,
        username: input.username,
        email: input.email,
        role: input.role,
        bio: None,
        profile_image_url: None,
    };
    state.users.push((user.clone(), input.password));
    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": user, "message": "User created successfully" })),
    ))
}
