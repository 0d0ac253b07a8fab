use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Once};

use pretty_assertions::assert_eq;
use scrape_core::{
    ActorDescriptor, ActorInput, AttemptOutcome, AttemptRecord, AttemptSource, CandidateTable,
    DomainRule, FinalSource, Platform, RetryPolicy, RunStatus, ScrapeTarget,
};
use scrape_engine::{
    ActorBackend, ApifyBackend, BackendError, Clock, EngineConfig, FailureKind, FetchError,
    FetchMetadata, FetchOutput, FetchSettings, Fetcher, Orchestrator, PollConfig,
    ReqwestProviderClient, RunHandle, RunSnapshot,
};
use serde_json::{json, Value};
use tokio::time::Instant;
use wiremock::matchers::{any, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING: &str = "https://www.zillow.com/homedetails/1";
const OTHER_LISTING: &str = "https://www.zillow.com/homedetails/2";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scrape_logging::initialize_for_tests);
}

fn fixed_clock() -> Clock {
    Arc::new(|| "2024-01-01T00:00:00Z".to_string())
}

fn actor(id: &str, priority: u8) -> ActorDescriptor {
    ActorDescriptor::new(id, ActorInput::start_urls()).with_priority(priority)
}

fn zillow_table() -> CandidateTable {
    CandidateTable::new(
        vec![DomainRule {
            domain: "zillow.com".into(),
            actors: vec![actor("a~one", 1), actor("b~two", 2)],
        }],
        actor("g~generic", 0),
    )
}

fn config(base_url: &str) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.backend.base_url = base_url.to_string();
    config.poll = PollConfig {
        base_interval_ms: 10,
        factor: 1.0,
        max_interval_ms: 10,
        max_attempts: 3,
        candidate_budget_ms: 2_000,
    };
    config.candidates = Some(zillow_table());
    config
}

/// Orchestrator against a wiremock backend with the given page fetcher.
fn orchestrator(
    server: &MockServer,
    config: EngineConfig,
    fetcher: Arc<dyn Fetcher>,
) -> Orchestrator {
    let client = ReqwestProviderClient::new(&FetchSettings::default(), RetryPolicy::none(), None)
        .expect("client");
    let backend = Arc::new(ApifyBackend::new(Arc::new(client), server.uri()));
    Orchestrator::with_backend(&config, backend, fixed_clock()).with_direct_fetcher(fetcher)
}

/// Answers every page request with the same canned result.
struct CannedPage(Result<FetchOutput, FetchError>);

impl CannedPage {
    fn html(body: &str) -> Arc<dyn Fetcher> {
        Arc::new(CannedPage(Ok(FetchOutput {
            bytes: body.as_bytes().to_vec(),
            metadata: FetchMetadata {
                original_url: LISTING.into(),
                final_url: LISTING.into(),
                status: 200,
                redirect_count: 0,
                content_type: Some("text/html; charset=utf-8".into()),
                byte_len: body.len() as u64,
            },
        })))
    }

    fn unreachable() -> Arc<dyn Fetcher> {
        Arc::new(CannedPage(Err(FetchError {
            kind: FailureKind::Network,
            message: "dns error: no such host".into(),
        })))
    }
}

#[async_trait::async_trait]
impl Fetcher for CannedPage {
    async fn fetch(&self, _url: &str) -> Result<FetchOutput, FetchError> {
        self.0.clone()
    }
}

fn run_body(run_id: &str, status: &str) -> Value {
    json!({
        "data": { "id": run_id, "status": status, "defaultDatasetId": format!("ds-{run_id}") }
    })
}

async fn mount_actor(server: &MockServer, actor_id: &str, run_id: &str, status: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/v2/acts/{actor_id}/runs")))
        .respond_with(ResponseTemplate::new(201).set_body_json(run_body(run_id, "READY")))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/v2/actor-runs/{run_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body(run_id, status)))
        .mount(server)
        .await;
}

async fn mount_dataset(server: &MockServer, run_id: &str, items: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/datasets/ds-{run_id}/items")))
        .respond_with(ResponseTemplate::new(200).set_body_json(items))
        .mount(server)
        .await;
}

fn listing_items() -> Value {
    json!([{ "url": LISTING, "title": "1 Main St", "description": "Three bed, two bath." }])
}

fn actor_ids(attempts: &[AttemptRecord]) -> Vec<String> {
    attempts.iter().map(|a| a.source.label().to_string()).collect()
}

#[tokio::test]
async fn failed_submission_falls_through_to_next_candidate() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/acts/a~one/runs"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    mount_actor(&server, "b~two", "run-b", "SUCCEEDED").await;
    mount_dataset(&server, "run-b", listing_items()).await;
    Mock::given(method("POST"))
        .and(path("/v2/acts/g~generic/runs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(run_body("run-g", "READY")))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, config(&server.uri()), CannedPage::unreachable());
    let results = orchestrator.scrape(vec![ScrapeTarget::new(LISTING)]).await;

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.final_source, FinalSource::Actor);
    assert!(!result.synthetic);
    assert_eq!(actor_ids(&result.attempts), vec!["a~one", "b~two"]);
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::SubmitFailed);
    assert_eq!(
        result.attempts[1].outcome,
        AttemptOutcome::Succeeded { items: 1 }
    );
    let item = &result.items[0];
    assert_eq!(item.source, "b~two");
    assert_eq!(item.title, "1 Main St");
    assert_eq!(item.content, "Three bed, two bath.");
    assert_eq!(item.platform, Platform::Zillow);
    assert_eq!(item.extracted_at, "2024-01-01T00:00:00Z");
}

#[tokio::test]
async fn first_success_stops_the_cascade() {
    init_logging();
    let server = MockServer::start().await;
    mount_actor(&server, "a~one", "run-a", "SUCCEEDED").await;
    mount_dataset(&server, "run-a", listing_items()).await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v2/acts/(b~two|g~generic)/runs$"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, config(&server.uri()), CannedPage::unreachable());
    let results = orchestrator.scrape(vec![ScrapeTarget::new(LISTING)]).await;

    assert_eq!(results[0].final_source, FinalSource::Actor);
    assert_eq!(actor_ids(&results[0].attempts), vec!["a~one"]);
}

#[tokio::test]
async fn empty_dataset_escalates_to_next_candidate() {
    init_logging();
    let server = MockServer::start().await;
    mount_actor(&server, "a~one", "run-a", "SUCCEEDED").await;
    mount_dataset(&server, "run-a", json!([{}, null, { "text": "  " }])).await;
    mount_actor(&server, "b~two", "run-b", "SUCCEEDED").await;
    mount_dataset(&server, "run-b", listing_items()).await;

    let orchestrator = orchestrator(&server, config(&server.uri()), CannedPage::unreachable());
    let results = orchestrator.scrape(vec![ScrapeTarget::new(LISTING)]).await;

    let result = &results[0];
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::EmptyDataset);
    assert_eq!(result.final_source, FinalSource::Actor);
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].source, "b~two");
}

#[tokio::test]
async fn timed_out_actors_fall_back_to_direct_fetch() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v2/acts/[^/]+/runs$"))
        .respond_with(ResponseTemplate::new(201).set_body_json(run_body("run-x", "READY")))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/actor-runs/run-x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("run-x", "TIMED-OUT")))
        .mount(&server)
        .await;

    let page = CannedPage::html(
        "<html><head><title>1 Main St</title></head>\
         <body><main><p>Charming bungalow near the park.</p></main></body></html>",
    );
    let orchestrator = orchestrator(&server, config(&server.uri()), page);
    let results = orchestrator.scrape(vec![ScrapeTarget::new(LISTING)]).await;

    let result = &results[0];
    assert_eq!(result.final_source, FinalSource::Direct);
    assert_eq!(
        actor_ids(&result.attempts),
        vec!["a~one", "b~two", "g~generic", "direct"]
    );
    for attempt in &result.attempts[..3] {
        assert_eq!(
            attempt.outcome,
            AttemptOutcome::TerminalFailure {
                status: RunStatus::TimedOut
            }
        );
    }
    assert_eq!(result.attempts[3].outcome, AttemptOutcome::Fetched);
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].source, "direct");
    assert_eq!(result.items[0].title, "1 Main St");
    assert!(result.items[0].content.contains("Charming bungalow"));
}

#[tokio::test]
async fn total_failure_yields_platform_tagged_placeholder() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/v2/acts/[^/]+/runs$"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, config(&server.uri()), CannedPage::unreachable());
    let results = orchestrator.scrape(vec![ScrapeTarget::new(LISTING)]).await;

    let result = &results[0];
    assert!(result.synthetic);
    assert_eq!(result.final_source, FinalSource::Synthetic);
    assert_eq!(result.items.len(), 1);
    let item = &result.items[0];
    assert!(item.synthetic);
    assert_eq!(item.platform, Platform::Zillow);
    assert_eq!(item.url, LISTING);
    let codes: Vec<&str> = result.attempts.iter().map(|a| a.outcome.code()).collect();
    assert_eq!(
        codes,
        vec![
            "submit_failed",
            "submit_failed",
            "submit_failed",
            "unreachable",
            "synthesized"
        ]
    );
    assert_eq!(result.attempts[4].source, AttemptSource::Synthetic);
}

#[tokio::test]
async fn empty_batch_makes_no_calls() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, config(&server.uri()), CannedPage::unreachable());
    assert!(orchestrator.scrape(Vec::new()).await.is_empty());
}

#[tokio::test]
async fn targets_beyond_batch_cap_are_synthesized_in_order() {
    init_logging();
    let server = MockServer::start().await;
    mount_actor(&server, "a~one", "run-a", "SUCCEEDED").await;
    mount_dataset(&server, "run-a", listing_items()).await;

    let mut config = config(&server.uri());
    config.batch.max_batch_size = 1;
    let orchestrator = orchestrator(&server, config, CannedPage::unreachable());
    let targets = vec![
        ScrapeTarget::new(LISTING),
        ScrapeTarget::new("https://www.reddit.com/r/homes/comments/abc"),
    ];
    let results = orchestrator.scrape(targets).await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].final_source, FinalSource::Actor);
    assert!(results[1].synthetic);
    assert_eq!(results[1].target.url, "https://www.reddit.com/r/homes/comments/abc");
    assert_eq!(results[1].items[0].platform, Platform::Reddit);
    assert_eq!(
        results[1].attempts[0].outcome,
        AttemptOutcome::BatchCapExceeded
    );
}

#[tokio::test]
async fn item_content_respects_configured_bound() {
    init_logging();
    let server = MockServer::start().await;
    mount_actor(&server, "a~one", "run-a", "SUCCEEDED").await;
    let long = "word ".repeat(200);
    mount_dataset(
        &server,
        "run-a",
        json!([{ "url": LISTING, "title": "Long", "text": long }]),
    )
    .await;

    let mut config = config(&server.uri());
    config.direct.max_content_chars = 40;
    let orchestrator = orchestrator(&server, config, CannedPage::unreachable());
    let results = orchestrator.scrape(vec![ScrapeTarget::new(LISTING)]).await;

    let content = &results[0].items[0].content;
    assert!(!content.is_empty());
    assert!(content.chars().count() <= 40);
}

#[tokio::test]
async fn duplicate_items_in_one_dataset_are_dropped() {
    init_logging();
    let server = MockServer::start().await;
    mount_actor(&server, "a~one", "run-a", "SUCCEEDED").await;
    mount_dataset(
        &server,
        "run-a",
        json!([
            { "url": LISTING, "title": "1 Main St", "text": "Same listing." },
            { "url": format!("{LISTING}/#photos"), "title": "1 Main St", "text": "Same listing." },
            { "url": OTHER_LISTING, "title": "2 Oak Ave", "text": "Other." }
        ]),
    )
    .await;

    let orchestrator = orchestrator(&server, config(&server.uri()), CannedPage::unreachable());
    let results = orchestrator.scrape(vec![ScrapeTarget::new(LISTING)]).await;

    let titles: Vec<&str> = results[0].items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["1 Main St", "2 Oak Ave"]);
}

/// Backend whose runs never finish; counts aborts.
#[derive(Default)]
struct NeverFinishes {
    aborts: AtomicU32,
}

#[async_trait::async_trait]
impl ActorBackend for NeverFinishes {
    async fn start_run(
        &self,
        actor: &ActorDescriptor,
        _target: &ScrapeTarget,
    ) -> Result<RunHandle, BackendError> {
        Ok(RunHandle {
            actor_id: actor.id.clone(),
            run_id: "run-slow".into(),
            dataset_id: None,
            started_at: Instant::now(),
        })
    }

    async fn run_status(&self, _handle: &RunHandle) -> Result<RunSnapshot, BackendError> {
        Ok(RunSnapshot {
            status: RunStatus::Running,
            dataset_id: None,
        })
    }

    async fn dataset_items(&self, _id: &str, _limit: usize) -> Result<Vec<Value>, BackendError> {
        Ok(Vec::new())
    }

    async fn abort_run(&self, _handle: &RunHandle) -> Result<(), BackendError> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn target_budget_cancels_actor_and_moves_to_direct() {
    init_logging();
    let backend = Arc::new(NeverFinishes::default());
    let mut config = EngineConfig::default();
    config.poll.candidate_budget_ms = 3_600_000;
    config.poll.max_attempts = 10_000;
    config.batch.target_budget_ms = 10_000;
    config.candidates = Some(CandidateTable::new(Vec::new(), actor("g~generic", 0)));

    let page = CannedPage::html("<html><body><p>Still reachable.</p></body></html>");
    let orchestrator = Orchestrator::with_backend(&config, backend.clone(), fixed_clock())
        .with_direct_fetcher(page);
    let started = Instant::now();
    let results = orchestrator.scrape(vec![ScrapeTarget::new(LISTING)]).await;

    assert!(started.elapsed() < std::time::Duration::from_millis(12_000));
    let result = &results[0];
    assert_eq!(result.final_source, FinalSource::Direct);
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::Cancelled);
    assert_eq!(result.attempts[1].outcome, AttemptOutcome::Fetched);
    assert_eq!(backend.aborts.load(Ordering::SeqCst), 1);
}

/// Panics for targets whose URL contains `boom`, succeeds otherwise.
struct Explosive;

#[async_trait::async_trait]
impl ActorBackend for Explosive {
    async fn start_run(
        &self,
        actor: &ActorDescriptor,
        target: &ScrapeTarget,
    ) -> Result<RunHandle, BackendError> {
        if target.url.contains("boom") {
            panic!("backend exploded");
        }
        Ok(RunHandle {
            actor_id: actor.id.clone(),
            run_id: "run-ok".into(),
            dataset_id: Some("ds-ok".into()),
            started_at: Instant::now(),
        })
    }

    async fn run_status(&self, _handle: &RunHandle) -> Result<RunSnapshot, BackendError> {
        Ok(RunSnapshot {
            status: RunStatus::Succeeded,
            dataset_id: Some("ds-ok".into()),
        })
    }

    async fn dataset_items(&self, _id: &str, _limit: usize) -> Result<Vec<Value>, BackendError> {
        Ok(vec![json!({ "title": "Post", "text": "Neighbours love it." })])
    }

    async fn abort_run(&self, _handle: &RunHandle) -> Result<(), BackendError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn panicking_stage_is_contained_to_its_target() {
    init_logging();
    let mut config = EngineConfig::default();
    config.candidates = Some(CandidateTable::new(Vec::new(), actor("g~generic", 0)));
    let orchestrator = Orchestrator::with_backend(&config, Arc::new(Explosive), fixed_clock())
        .with_direct_fetcher(CannedPage::unreachable());

    let targets = vec![
        ScrapeTarget::new("https://example.com/boom"),
        ScrapeTarget::new("https://example.com/fine"),
    ];
    let results = orchestrator.scrape(targets).await;

    assert_eq!(results.len(), 2);
    assert!(results[0].synthetic);
    assert_eq!(results[0].attempts.len(), 1);
    assert_eq!(results[0].attempts[0].outcome, AttemptOutcome::Panicked);
    assert_eq!(
        results[0].attempts[0].error.as_deref(),
        Some("backend exploded")
    );
    assert_eq!(results[1].final_source, FinalSource::Actor);
    assert_eq!(results[1].items[0].content, "Neighbours love it.");
}
