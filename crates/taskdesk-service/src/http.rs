use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use taskdesk_core::task::{ChecklistItem, StatusFilter, Task};
use taskdesk_core::user::{CreateUser, LoginRequest, RegisterUser, User};
use tracing::debug;

use crate::{AuthService, ServiceError, TaskListing, TaskService};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Body returned by login and registration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    #[serde(default)]
    task: Option<Task>,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    #[serde(default)]
    user: Option<User>,
}

#[derive(Serialize)]
struct ChecklistBody<'a> {
    #[serde(rename = "todoCheckList")]
    checklist: &'a [ChecklistItem],
}

/// Async HTTP client for the task store API.
///
/// Every request carries the bearer token (when one is set) and is bounded
/// by the configured timeout.
pub struct HttpService {
    base_url: String,
    client: Client,
    token: RwLock<Option<String>>,
    timeout: Duration,
}

impl HttpService {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
            token: RwLock::new(None),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_token(base_url: &str, token: String) -> Self {
        let svc = Self::new(base_url);
        svc.set_token(Some(token));
        svc
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Swap the bearer token, e.g. after login or logout.
    pub fn set_token(&self, token: Option<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = token;
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.read().map(|t| t.is_some()).unwrap_or(false)
    }

    fn prepare(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.timeout(self.timeout);
        let token = self.token.read().ok().and_then(|t| t.clone());
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ServiceError> {
        self.prepare(builder).send().await.map_err(transport_error)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ServiceError> {
        debug!("GET {path}");
        let builder = self.client.get(format!("{}{path}", self.base_url));
        let resp = self.send(builder).await?;
        handle_response(resp).await
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        debug!("POST {path}");
        let builder = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body);
        let resp = self.send(builder).await?;
        handle_response(resp).await
    }

    async fn put_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ServiceError> {
        debug!("PUT {path}");
        let builder = self
            .client
            .put(format!("{}{path}", self.base_url))
            .json(body);
        let resp = self.send(builder).await?;
        handle_response(resp).await
    }
}

fn transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout
    } else {
        ServiceError::Transport(e.to_string())
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout
            } else {
                ServiceError::Decode(e.to_string())
            }
        })
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

async fn parse_error_with_status(status: StatusCode, resp: reqwest::Response) -> ServiceError {
    let body = resp.text().await.unwrap_or_default();
    let msg = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v["message"]
                .as_str()
                .or_else(|| v["error"].as_str())
                .map(String::from)
        })
        .unwrap_or(body);

    match status {
        StatusCode::NOT_FOUND => ServiceError::NotFound(msg),
        StatusCode::BAD_REQUEST => ServiceError::InvalidInput(msg),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Unauthorized(msg),
        other => ServiceError::Status {
            status: other.as_u16(),
            message: msg,
        },
    }
}

#[async_trait]
impl TaskService for HttpService {
    async fn list_tasks(&self, filter: StatusFilter) -> Result<TaskListing, ServiceError> {
        debug!("GET /tasks status={:?}", filter.query_value());
        let builder = self
            .client
            .get(format!("{}/tasks", self.base_url))
            .query(&[("status", filter.query_value())]);
        let resp = self.send(builder).await?;
        handle_response(resp).await
    }

    async fn get_task(&self, id: &str) -> Result<Task, ServiceError> {
        let envelope: TaskEnvelope = self.get_json(&format!("/tasks/{id}")).await?;
        envelope
            .task
            .ok_or_else(|| ServiceError::NotFound(format!("task {id}")))
    }

    async fn update_checklist(
        &self,
        id: &str,
        checklist: &[ChecklistItem],
    ) -> Result<Option<Task>, ServiceError> {
        let envelope: TaskEnvelope = self
            .put_json(&format!("/tasks/{id}/todo"), &ChecklistBody { checklist })
            .await?;
        Ok(envelope.task)
    }
}

#[async_trait]
impl AuthService for HttpService {
    async fn login(&self, input: &LoginRequest) -> Result<AuthResponse, ServiceError> {
        input.validate()?;
        self.post_json("/auth/login", input).await
    }

    async fn register(&self, input: &RegisterUser) -> Result<AuthResponse, ServiceError> {
        input.validate()?;
        self.post_json("/auth/register", input).await
    }

    async fn get_profile(&self) -> Result<User, ServiceError> {
        self.get_json("/auth/profile").await
    }

    async fn create_user(&self, input: &CreateUser) -> Result<User, ServiceError> {
        input.validate()?;
        let envelope: UserEnvelope = self.post_json("/users", input).await?;
        envelope
            .user
            .ok_or_else(|| ServiceError::Decode("missing user in response".into()))
    }
}
