use taskdesk_service::ServiceError;
use thiserror::Error;

use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("fetch failed: {0}")]
    Fetch(ServiceError),

    #[error("write failed: {0}")]
    Write(ServiceError),

    #[error("authentication failed: {0}")]
    Auth(ServiceError),

    #[error("session: {0}")]
    Session(#[from] SessionError),

    #[error("could not open link: {0}")]
    Open(String),

    #[error("view closed")]
    Cancelled,
}
