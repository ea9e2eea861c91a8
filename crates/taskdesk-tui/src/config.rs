use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use taskdesk_service::{HttpService, DEFAULT_API_URL};
use taskdesk_views::Session;

#[derive(Debug, Clone, Args)]
pub struct ClientConfig {
    /// Base URL of the task API
    #[arg(long, env = "TASKDESK_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Bearer token; overrides saved credentials
    #[arg(long, env = "TASKDESK_TOKEN", global = true)]
    pub token: Option<String>,

    /// Per-request timeout (seconds)
    #[arg(long, env = "TASKDESK_TIMEOUT_SECS", default_value = "10", global = true)]
    pub timeout_secs: u64,

    /// Where login credentials are kept
    #[arg(long, env = "TASKDESK_CREDENTIALS", global = true)]
    pub credentials: Option<PathBuf>,

    /// Log file used while the terminal UI is running
    #[arg(long, env = "TASKDESK_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.credentials
            .clone()
            .unwrap_or_else(|| app_dir(dirs::config_dir()).join("credentials.json"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| app_dir(dirs::data_local_dir()).join("taskdesk.log"))
    }

    /// HTTP client carrying the explicit token, or the session's.
    pub fn build_service(&self, session: &Session) -> HttpService {
        let svc = HttpService::new(&self.api_url).with_timeout(self.timeout());
        svc.set_token(self.token.clone().or_else(|| session.token()));
        svc
    }
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join("taskdesk")
}
