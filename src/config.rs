//! Configuration types.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Default Gmail REST base URL.
pub const DEFAULT_GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// When a cycle with isolated per-message failures may advance the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvancePolicy {
    /// Advance once every message has settled, failed or not.
    #[default]
    Settled,
    /// Advance only if no message failed with a transient error.
    FullSuccess,
}

impl std::str::FromStr for AdvancePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "settled" | "always" => Ok(Self::Settled),
            "full_success" | "full-success" => Ok(Self::FullSuccess),
            other => Err(ConfigError::InvalidValue {
                key: "INBOX_SYNC_ADVANCE_POLICY".into(),
                message: format!("unknown policy '{other}'"),
            }),
        }
    }
}

/// Retry schedule for transient backend failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Delay before the first retry; doubles per attempt.
    pub base_delay: Duration,
    /// Upper bound on a single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    /// Longest a retried call can take: every attempt timing out plus the
    /// backoff between them.
    pub fn worst_case(&self, call_timeout: Duration) -> Duration {
        let attempts = self.attempts.max(1);
        let backoff: Duration = (0..attempts - 1)
            .map(|attempt| crate::mail::retry::backoff_delay(self, attempt))
            .sum();
        call_timeout.saturating_mul(attempts) + backoff
    }
}

/// Sync engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Timeout for a single backend call.
    pub call_timeout: Duration,
    /// Budget for processing one notification end to end.
    pub notification_budget: Duration,
    /// Messages of one diff fetched concurrently.
    pub fetch_concurrency: usize,
    pub retry: RetryConfig,
    pub advance_policy: AdvancePolicy,
    /// Pub/Sub topic the mailbox watch publishes to.
    pub topic_name: String,
    /// Labels the watch is restricted to.
    pub watch_labels: Vec<String>,
    /// Rolling window of the summary query, in days.
    pub summary_window_days: u32,
    pub summary_max_results: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(2),
            notification_budget: Duration::from_secs(9),
            fetch_concurrency: 4,
            retry: RetryConfig::default(),
            advance_policy: AdvancePolicy::Settled,
            topic_name: topic_for_project("YOUR_PROJECT_ID"),
            watch_labels: vec!["INBOX".to_string()],
            summary_window_days: 30,
            summary_max_results: 500,
        }
    }
}

impl SyncConfig {
    /// Time left for backend calls once a tenth of the budget is held back
    /// for emitting results and settling the cursor.
    pub fn work_window(&self) -> Duration {
        self.notification_budget - self.notification_budget / 10
    }

    /// Reject a retry schedule that cannot finish inside the notification
    /// budget.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let worst_case = self.retry.worst_case(self.call_timeout);
        if worst_case > self.work_window() {
            return Err(ConfigError::InvalidValue {
                key: "INBOX_SYNC_NOTIFICATION_BUDGET_MS".into(),
                message: format!(
                    "retries can take {worst_case:?}, more than the {:?} left in a {:?} budget",
                    self.work_window(),
                    self.notification_budget
                ),
            });
        }
        Ok(())
    }

    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let project = std::env::var("GOOGLE_CLOUD_PROJECT").unwrap_or_else(|_| {
            tracing::warn!("GOOGLE_CLOUD_PROJECT not set, using placeholder");
            "YOUR_PROJECT_ID".to_string()
        });

        let watch_labels: Vec<String> = std::env::var("INBOX_SYNC_WATCH_LABELS")
            .unwrap_or_else(|_| "INBOX".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let advance_policy = match std::env::var("INBOX_SYNC_ADVANCE_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_) => AdvancePolicy::default(),
        };

        let fetch_concurrency = env_parse("INBOX_SYNC_FETCH_CONCURRENCY", defaults.fetch_concurrency);
        if fetch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "INBOX_SYNC_FETCH_CONCURRENCY".into(),
                message: "must be at least 1".into(),
            });
        }

        let config = Self {
            call_timeout: env_millis("INBOX_SYNC_CALL_TIMEOUT_MS", defaults.call_timeout),
            notification_budget: env_millis(
                "INBOX_SYNC_NOTIFICATION_BUDGET_MS",
                defaults.notification_budget,
            ),
            fetch_concurrency,
            retry: RetryConfig {
                attempts: env_parse("INBOX_SYNC_RETRY_ATTEMPTS", defaults.retry.attempts).max(1),
                base_delay: env_millis("INBOX_SYNC_RETRY_BASE_MS", defaults.retry.base_delay),
                ..defaults.retry
            },
            advance_policy,
            topic_name: topic_for_project(&project),
            watch_labels,
            summary_window_days: env_parse(
                "INBOX_SYNC_SUMMARY_WINDOW_DAYS",
                defaults.summary_window_days,
            ),
            summary_max_results: env_parse(
                "INBOX_SYNC_SUMMARY_MAX_RESULTS",
                defaults.summary_max_results,
            )
            .clamp(1, 500),
        };
        config.validate()?;
        Ok(config)
    }
}

/// HTTP server and backend wiring, read by the binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub gmail_api_base: String,
    /// Optional JSON file of `{ "<email>": "<access token>" }`.
    pub credentials_path: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parse("INBOX_SYNC_PORT", 8080),
            gmail_api_base: std::env::var("INBOX_SYNC_GMAIL_API_BASE")
                .unwrap_or_else(|_| DEFAULT_GMAIL_API_BASE.to_string()),
            credentials_path: std::env::var("INBOX_SYNC_CREDENTIALS").ok(),
        }
    }
}

/// Read a credentials file mapping account address to bearer token.
pub fn load_credentials_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Credentials {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Pub/Sub topic used for Gmail push notifications.
pub fn topic_for_project(project_id: &str) -> String {
    format!("projects/{project_id}/topics/gmail-notifications")
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
