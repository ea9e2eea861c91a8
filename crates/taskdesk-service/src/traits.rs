use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taskdesk_core::task::{ChecklistItem, StatusFilter, Task};
use taskdesk_core::user::{CreateUser, LoginRequest, RegisterUser, User};
use taskdesk_core::{StatusSummary, TaskdeskError};
use thiserror::Error;

use crate::http::AuthResponse;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("request timed out")]
    Timeout,

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("connection failed: {0}")]
    Transport(String),

    #[error("json decode: {0}")]
    Decode(String),
}

impl From<TaskdeskError> for ServiceError {
    fn from(e: TaskdeskError) -> Self {
        match e {
            TaskdeskError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
            other => ServiceError::InvalidInput(other.to_string()),
        }
    }
}

/// One page of the task list plus the store's status counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListing {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub status_summary: StatusSummary,
}

/// The remote task store.
///
/// Views program against this trait. `HttpService` talks to the real API;
/// tests substitute in-memory or scripted stores.
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn list_tasks(&self, filter: StatusFilter) -> Result<TaskListing, ServiceError>;
    async fn get_task(&self, id: &str) -> Result<Task, ServiceError>;

    /// Replaces the task's whole checklist. `Ok(None)` means the store
    /// acknowledged the write without echoing the task back.
    async fn update_checklist(
        &self,
        id: &str,
        checklist: &[ChecklistItem],
    ) -> Result<Option<Task>, ServiceError>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, input: &LoginRequest) -> Result<AuthResponse, ServiceError>;
    async fn register(&self, input: &RegisterUser) -> Result<AuthResponse, ServiceError>;
    async fn get_profile(&self) -> Result<User, ServiceError>;
    async fn create_user(&self, input: &CreateUser) -> Result<User, ServiceError>;
}
