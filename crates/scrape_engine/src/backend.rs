use std::sync::Arc;

use scrape_core::{ActorDescriptor, RunStatus, ScrapeTarget};
use scrape_logging::scrape_debug;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::{ProviderClient, ProviderError, ProviderRequest, ProviderResponse};

/// One in-flight backend run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHandle {
    pub actor_id: String,
    pub run_id: String,
    pub dataset_id: Option<String>,
    pub started_at: Instant,
}

/// Status observed by one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    pub status: RunStatus,
    pub dataset_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("backend answered with http status {status}")]
    HttpStatus { status: u16 },
    #[error("start response carried no run id")]
    MissingRunId,
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

/// Submit, status, dataset and abort calls of an asynchronous scraping
/// backend.
#[async_trait::async_trait]
pub trait ActorBackend: Send + Sync {
    async fn start_run(
        &self,
        actor: &ActorDescriptor,
        target: &ScrapeTarget,
    ) -> Result<RunHandle, BackendError>;

    async fn run_status(&self, handle: &RunHandle) -> Result<RunSnapshot, BackendError>;

    async fn dataset_items(&self, dataset_id: &str, limit: usize)
        -> Result<Vec<Value>, BackendError>;

    async fn abort_run(&self, handle: &RunHandle) -> Result<(), BackendError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RunData {
    id: Option<String>,
    status: Option<String>,
    default_dataset_id: Option<String>,
}

/// `ActorBackend` speaking the Apify v2 REST API.
pub struct ApifyBackend {
    client: Arc<dyn ProviderClient>,
    base_url: String,
}

impl ApifyBackend {
    pub fn new(client: Arc<dyn ProviderClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn start_url(&self, actor: &ActorDescriptor) -> String {
        let mut url = format!("{}/v2/acts/{}/runs", self.base_url, actor.id);
        let limits = actor.limits;
        let params: Vec<String> = [
            ("memory", limits.memory_mbytes),
            ("timeout", limits.timeout_secs),
            ("maxItems", limits.max_items),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| format!("{key}={v}")))
        .collect();
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    async fn send_ok(&self, request: ProviderRequest) -> Result<ProviderResponse, BackendError> {
        let response = self.client.send(request).await?;
        if !response.is_success() {
            return Err(BackendError::HttpStatus {
                status: response.status,
            });
        }
        Ok(response)
    }

    async fn run_data(&self, request: ProviderRequest) -> Result<RunData, BackendError> {
        let response = self.send_ok(request).await?;
        let envelope: ApiResponse<RunData> = response
            .json()
            .map_err(|err| BackendError::Malformed(err.to_string()))?;
        Ok(envelope.data)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait::async_trait]
impl ActorBackend for ApifyBackend {
    async fn start_run(
        &self,
        actor: &ActorDescriptor,
        target: &ScrapeTarget,
    ) -> Result<RunHandle, BackendError> {
        let request = ProviderRequest::post(self.start_url(actor), Some(actor.build_input(target)));
        let data = self.run_data(request).await?;
        let run_id = non_blank(data.id).ok_or(BackendError::MissingRunId)?;
        scrape_debug!("Started run {} of {} for {}", run_id, actor.id, target.url);
        Ok(RunHandle {
            actor_id: actor.id.clone(),
            run_id,
            dataset_id: non_blank(data.default_dataset_id),
            started_at: Instant::now(),
        })
    }

    async fn run_status(&self, handle: &RunHandle) -> Result<RunSnapshot, BackendError> {
        let url = format!("{}/v2/actor-runs/{}", self.base_url, handle.run_id);
        let data = self.run_data(ProviderRequest::get(url)).await?;
        let status = data
            .status
            .as_deref()
            .map(RunStatus::from_backend)
            .ok_or_else(|| BackendError::Malformed("run status missing".into()))?;
        Ok(RunSnapshot {
            status,
            dataset_id: non_blank(data.default_dataset_id).or_else(|| handle.dataset_id.clone()),
        })
    }

    async fn dataset_items(
        &self,
        dataset_id: &str,
        limit: usize,
    ) -> Result<Vec<Value>, BackendError> {
        let url = format!(
            "{}/v2/datasets/{}/items?clean=true&format=json&limit={}",
            self.base_url, dataset_id, limit
        );
        let response = self.send_ok(ProviderRequest::get(url)).await?;
        match response.json::<Value>() {
            Ok(Value::Array(items)) => Ok(items),
            Ok(other) => Err(BackendError::Malformed(format!(
                "expected an item array, got {}",
                json_kind(&other)
            ))),
            Err(err) => Err(BackendError::Malformed(err.to_string())),
        }
    }

    async fn abort_run(&self, handle: &RunHandle) -> Result<(), BackendError> {
        let url = format!("{}/v2/actor-runs/{}/abort", self.base_url, handle.run_id);
        self.send_ok(ProviderRequest::post(url, None)).await?;
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use scrape_core::{ActorDescriptor, ActorInput, ResourceLimits};

    use super::ApifyBackend;
    use crate::{
        FailureKind, FetchError, ProviderClient, ProviderError, ProviderRequest, ProviderResponse,
    };

    struct Offline;

    #[async_trait::async_trait]
    impl ProviderClient for Offline {
        async fn send(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Err(FetchError {
                kind: FailureKind::Network,
                message: "offline".into(),
            }
            .into())
        }
    }

    #[test]
    fn start_url_carries_only_configured_limits() {
        let backend = ApifyBackend::new(Arc::new(Offline), "https://api.test/");
        let actor = ActorDescriptor::new("owner~actor", ActorInput::start_urls()).with_limits(
            ResourceLimits {
                memory_mbytes: Some(1024),
                timeout_secs: None,
                max_items: Some(10),
            },
        );
        assert_eq!(
            backend.start_url(&actor),
            "https://api.test/v2/acts/owner~actor/runs?memory=1024&maxItems=10"
        );

        let bare = ActorDescriptor::new("owner~bare", ActorInput::start_urls());
        assert_eq!(
            backend.start_url(&bare),
            "https://api.test/v2/acts/owner~bare/runs"
        );
    }
}
