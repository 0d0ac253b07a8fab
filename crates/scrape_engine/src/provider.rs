use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use scrape_core::RetryPolicy;
use scrape_logging::{scrape_debug, scrape_warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::fetch::{build_client, map_reqwest_error, parse_http_url, read_capped_body};
use crate::{FetchError, FetchSettings};

/// One call against a scraping backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl ProviderRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            body,
        }
    }
}

/// Raw answer from a backend. Non-2xx statuses are returned, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ProviderResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error(transparent)]
    Transport(#[from] FetchError),
    #[error("request body could not be encoded: {0}")]
    Encode(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transport(err) if err.kind.is_transient())
    }
}

/// Already-authenticated access to a scraping backend, shared by every
/// cascade in a batch.
#[async_trait::async_trait]
pub trait ProviderClient: Send + Sync {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}

/// `ProviderClient` over reqwest with request-level retries.
///
/// The bearer token is attached to every request this client sends; the
/// direct fetch uses its own client so the token never leaves the backend.
#[derive(Clone)]
pub struct ReqwestProviderClient {
    client: reqwest::Client,
    retry: RetryPolicy,
    token: Option<String>,
    max_bytes: u64,
}

impl ReqwestProviderClient {
    pub fn new(
        settings: &FetchSettings,
        retry: RetryPolicy,
        token: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = build_client(settings, None)?;
        Ok(Self {
            client,
            retry,
            token: token.filter(|t| !t.trim().is_empty()),
            max_bytes: settings.max_bytes,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    async fn send_once(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let url = parse_http_url(&request.url)?;
        let mut builder = self.client.request(request.method.clone(), url);
        if let Some(token) = self.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body.as_ref() {
            let encoded =
                serde_json::to_vec(body).map_err(|err| ProviderError::Encode(err.to_string()))?;
            builder = builder.header(CONTENT_TYPE, "application/json").body(encoded);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = read_capped_body(response, self.max_bytes).await?;
        Ok(ProviderResponse {
            status,
            body: Bytes::from(body),
        })
    }
}

#[async_trait::async_trait]
impl ProviderClient for ReqwestProviderClient {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut attempt = 1;
        loop {
            let result = self.send_once(&request).await;
            let retryable = match &result {
                Ok(response) => {
                    !response.is_success() && self.retry.should_retry_status(response.status)
                }
                Err(err) => err.is_transient(),
            };
            if !retryable || !self.retry.allows_retry(attempt) {
                if let Ok(response) = &result {
                    scrape_debug!(
                        "{} {} -> {} after {} attempt(s)",
                        request.method,
                        request.url,
                        response.status,
                        attempt
                    );
                }
                return result;
            }

            let delay = self.retry.delay_after(attempt);
            match &result {
                Ok(response) => scrape_warn!(
                    "{} {} returned {}; retrying in {:?}",
                    request.method,
                    request.url,
                    response.status,
                    delay
                ),
                Err(err) => scrape_warn!(
                    "{} {} failed: {}; retrying in {:?}",
                    request.method,
                    request.url,
                    err,
                    delay
                ),
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
