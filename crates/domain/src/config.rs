//! Process-wide configuration, captured once at startup from the
//! environment (spec §9 "Global mutable state" — no re-reading env after
//! startup).

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Configuration for the Runner binary (spec §3 "Runner session", §6).
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub openrouter_api_key: String,
    pub openrouter_model: Option<String>,
    pub work_interval_minutes: u32,
    pub base_url: String,
    pub working_dir: PathBuf,
}

impl RunnerConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://openrouter.ai/api/v1";
    pub const RETRY_DELAY_SECONDS: u64 = 60;
    pub const DISPLAY_TRUNCATE_LENGTH: usize = 200;
    pub const MAX_TOOL_LOOP_ITERATIONS: usize = 30;
    pub const BASH_TIMEOUT_SECONDS: u64 = 300;

    /// Load from the environment. `OPENROUTER_API_KEY` and
    /// `WORK_INTERVAL_MINUTES` are required (spec §4.1 "Missing
    /// credentials"); `OPENROUTER_MODEL` absence is tolerated at construct
    /// time per spec §6.
    pub fn from_env(working_dir: PathBuf) -> Result<Self> {
        let openrouter_api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| Error::Config("OPENROUTER_API_KEY not set".to_string()))?;
        let openrouter_model = std::env::var("OPENROUTER_MODEL").ok();
        let work_interval_minutes = std::env::var("WORK_INTERVAL_MINUTES")
            .map_err(|_| Error::Config("WORK_INTERVAL_MINUTES not set".to_string()))?
            .parse::<u32>()
            .map_err(|e| Error::Config(format!("WORK_INTERVAL_MINUTES: {e}")))?;
        let base_url = std::env::var("OPENROUTER_BASE_URL")
            .unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string());

        Ok(Self {
            openrouter_api_key,
            openrouter_model,
            work_interval_minutes,
            base_url,
            working_dir,
        })
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(Self::RETRY_DELAY_SECONDS)
    }

    pub fn bash_timeout(&self) -> Duration {
        Duration::from_secs(Self::BASH_TIMEOUT_SECONDS)
    }
}

/// Configuration for the Watcher binary (spec §4.5, §4.6).
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub main_dir: PathBuf,
    /// Used only to size/label a future status endpoint; no listener is
    /// started by this crate (spec §1 explicitly excludes the status HTTP
    /// endpoint from scope).
    pub status_port: u16,
    pub branch_label: Option<String>,
}

impl WatcherConfig {
    pub const CHECK_INTERVAL_SECONDS: u64 = 5;
    pub const CPU_THRESHOLD_PERCENT: f32 = 95.0;
    pub const CPU_DURATION_SECONDS: u64 = 60;
    pub const LOG_SIZE_LIMIT_BYTES: u64 = 1024 * 1024;
    pub const CRASH_LIMIT: usize = 5;
    pub const CRASH_WINDOW_SECONDS: i64 = 60 * 60;
    pub const POST_LAUNCH_DELAY_SECONDS: u64 = 10;
    pub const POST_CRASH_LIMIT_DELAY_SECONDS: u64 = 300;
    pub const BOOTSTRAP_GRACE_SECONDS: u64 = 60;
    pub const TERMINATE_WAIT_SECONDS: u64 = 10;

    pub fn from_env(main_dir: PathBuf) -> Self {
        let status_port = std::env::var("AUTOFRAM_STATUS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let branch_label = std::env::var("AUTOFRAM_BRANCH").ok();

        Self {
            main_dir,
            status_port,
            branch_label,
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(Self::CHECK_INTERVAL_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch
    // them to avoid cross-test interference.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn missing_api_key_is_config_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("OPENROUTER_API_KEY");
        std::env::remove_var("WORK_INTERVAL_MINUTES");
        let err = RunnerConfig::from_env(PathBuf::from(".")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn valid_env_parses() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("OPENROUTER_API_KEY", "sk-test");
        std::env::set_var("WORK_INTERVAL_MINUTES", "10");
        std::env::remove_var("OPENROUTER_MODEL");
        let cfg = RunnerConfig::from_env(PathBuf::from(".")).unwrap();
        assert_eq!(cfg.work_interval_minutes, 10);
        assert_eq!(cfg.base_url, RunnerConfig::DEFAULT_BASE_URL);
        assert!(cfg.openrouter_model.is_none());
        std::env::remove_var("OPENROUTER_API_KEY");
        std::env::remove_var("WORK_INTERVAL_MINUTES");
    }

    #[test]
    fn watcher_config_defaults_status_port() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("AUTOFRAM_STATUS_PORT");
        let cfg = WatcherConfig::from_env(PathBuf::from("/tmp"));
        assert_eq!(cfg.status_port, 8080);
    }
}
