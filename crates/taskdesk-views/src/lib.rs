//! View models for the task screens.
//!
//! Each view owns its state, publishes snapshots through a `watch` channel
//! and ties every request it starts to a [`ViewScope`], so nothing resolves
//! into a view after it has been closed.

pub mod auth;
pub mod detail;
pub mod error;
pub mod list;
pub mod open;
pub mod scope;
pub mod session;

pub use detail::{DetailSnapshot, TaskDetailView, ToggleHandle, ToggleOutcome};
pub use error::ViewError;
pub use list::{ListSnapshot, LoadOutcome, TaskCard, TaskListView};
pub use scope::ViewScope;
pub use session::{Session, SessionError};
