mod http;
mod traits;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use http::{AuthResponse, HttpService, DEFAULT_API_URL, DEFAULT_TIMEOUT};
pub use traits::{AuthService, ServiceError, TaskListing, TaskService};
