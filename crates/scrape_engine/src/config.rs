use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use scrape_core::{is_transient_status, CandidateTable, PollSchedule, RetryPolicy};
use serde::Deserialize;

use crate::FetchSettings;

/// Supplies `extracted_at` timestamps. Injected so tests stay deterministic.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// RFC 3339 UTC wall clock.
pub fn system_clock() -> Clock {
    Arc::new(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(String),
}

/// Engine settings. Every field has a default, so an empty file is valid.
/// Durations are milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: BackendConfig,
    pub poll: PollConfig,
    pub retry: RetryConfig,
    pub direct: DirectConfig,
    pub batch: BatchConfig,
    /// Replaces the built-in domain table when set.
    pub candidates: Option<CandidateTable>,
}

impl EngineConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        ron::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    pub fn candidate_table(&self) -> CandidateTable {
        self.candidates.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Dataset items requested per successful run.
    pub item_limit: usize,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_response_bytes: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.apify.com".to_string(),
            item_limit: 50,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            max_response_bytes: 10 * 1024 * 1024,
        }
    }
}

impl BackendConfig {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_bytes: self.max_response_bytes,
            ..FetchSettings::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub base_interval_ms: u64,
    pub factor: f64,
    pub max_interval_ms: u64,
    pub max_attempts: u32,
    /// Wall-clock budget per candidate, from submission.
    pub candidate_budget_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        let schedule = PollSchedule::default();
        Self {
            base_interval_ms: schedule.base.as_millis() as u64,
            factor: schedule.factor,
            max_interval_ms: schedule.cap.as_millis() as u64,
            max_attempts: schedule.max_attempts,
            candidate_budget_ms: schedule.budget.as_millis() as u64,
        }
    }
}

impl PollConfig {
    pub fn schedule(&self) -> PollSchedule {
        PollSchedule {
            base: Duration::from_millis(self.base_interval_ms),
            factor: self.factor,
            cap: Duration::from_millis(self.max_interval_ms),
            max_attempts: self.max_attempts,
            budget: Duration::from_millis(self.candidate_budget_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            factor: policy.factor,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            factor: self.factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
            retryable_status: is_transient_status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DirectConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub max_content_chars: usize,
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
}

impl Default for DirectConfig {
    fn default() -> Self {
        let settings = FetchSettings::default();
        Self {
            connect_timeout_ms: settings.connect_timeout.as_millis() as u64,
            request_timeout_ms: settings.request_timeout.as_millis() as u64,
            redirect_limit: settings.redirect_limit,
            max_bytes: settings.max_bytes,
            max_content_chars: 8_000,
            allowed_content_types: settings.allowed_content_types,
            user_agent: settings.user_agent,
        }
    }
}

impl DirectConfig {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            redirect_limit: self.redirect_limit,
            max_bytes: self.max_bytes,
            allowed_content_types: self.allowed_content_types.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    /// Wall-clock budget for one target's actor cascade.
    pub target_budget_ms: u64,
    /// Time the cascade gets to wind down after its budget fired.
    pub cancel_grace_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 25,
            target_budget_ms: 240_000,
            cancel_grace_ms: 2_000,
        }
    }
}

impl BatchConfig {
    pub fn target_budget(&self) -> Duration {
        Duration::from_millis(self.target_budget_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}
