pub mod attachment;
pub mod error;
pub mod summary;
pub mod task;
pub mod user;

pub use error::TaskdeskError;
pub use summary::{StatusSummary, StatusTab};
pub use task::{ChecklistItem, Priority, Status, StatusFilter, Task};
pub use user::{Credentials, Role, User};
