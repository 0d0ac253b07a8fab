//! Scrape engine: backend I/O, the poll loop, direct fetch, and the batch
//! orchestrator that executes the cascade's effects.
mod backend;
mod cascade;
mod config;
mod decode;
mod direct;
mod extract;
mod fetch;
mod orchestrator;
mod poller;
mod provider;
mod types;

pub use backend::{ActorBackend, ApifyBackend, BackendError, RunHandle, RunSnapshot};
pub use cascade::CascadeController;
pub use config::{
    system_clock, BackendConfig, BatchConfig, Clock, ConfigError, DirectConfig, EngineConfig,
    PollConfig, RetryConfig,
};
pub use decode::{decode_html, decode_html_lossy, DecodeError, DecodedHtml};
pub use direct::{DirectFetcher, DIRECT_SOURCE};
pub use extract::{ExtractedText, Extractor, PlainTextExtractor};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher, RetryingFetcher, DEFAULT_USER_AGENT};
pub use orchestrator::Orchestrator;
pub use poller::{PollOutcome, Poller};
pub use provider::{
    ProviderClient, ProviderError, ProviderRequest, ProviderResponse, ReqwestProviderClient,
};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput};
