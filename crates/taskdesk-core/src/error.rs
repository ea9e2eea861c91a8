use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskdeskError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown value: {0}")]
    Unknown(String),
}
