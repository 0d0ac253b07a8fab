use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use scrape_core::{
    placeholder, AttemptOutcome, AttemptRecord, BatchResult, CascadeState, DedupeContext, Effect,
    Msg, ScrapeTarget, SynthesisReason,
};
use scrape_logging::{scrape_error, scrape_info, scrape_warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{system_clock, BatchConfig, Clock, EngineConfig};
use crate::poller::Poller;
use crate::{
    ActorBackend, ApifyBackend, CascadeController, DirectFetcher, Fetcher, ProviderClient,
    ReqwestFetcher, RetryingFetcher,
};

/// Resolves a batch of targets, one result per target, never failing.
pub struct Orchestrator {
    controller: CascadeController,
    direct: DirectFetcher,
    batch: BatchConfig,
    clock: Clock,
}

impl Orchestrator {
    pub fn new(
        controller: CascadeController,
        direct: DirectFetcher,
        batch: BatchConfig,
        clock: Clock,
    ) -> Self {
        Self {
            controller,
            direct,
            batch,
            clock,
        }
    }

    /// Apify backend over `client`, reqwest direct fetch, system clock.
    pub fn from_config(config: &EngineConfig, client: Arc<dyn ProviderClient>) -> Self {
        let backend = Arc::new(ApifyBackend::new(client, config.backend.base_url.clone()));
        Self::with_backend(config, backend, system_clock())
    }

    pub fn with_backend(
        config: &EngineConfig,
        backend: Arc<dyn ActorBackend>,
        clock: Clock,
    ) -> Self {
        let controller = CascadeController::new(
            backend,
            Poller::new(config.poll.schedule()),
            config.candidate_table(),
            config.backend.item_limit,
            config.direct.max_content_chars,
            clock.clone(),
        );
        let page = Arc::new(ReqwestFetcher::new(config.direct.fetch_settings()));
        let fetcher = Arc::new(RetryingFetcher::new(page, config.retry.policy()));
        let direct = DirectFetcher::new(fetcher, config.direct.max_content_chars);
        Self::new(controller, direct, config.batch.clone(), clock)
    }

    /// Swaps the page fetcher used by the direct rung. The fetcher is used as
    /// given, without the configured retries.
    pub fn with_direct_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.direct = DirectFetcher::new(fetcher, self.direct.max_content_chars());
        self
    }

    pub async fn scrape(&self, targets: Vec<ScrapeTarget>) -> Vec<BatchResult> {
        if targets.is_empty() {
            return Vec::new();
        }
        let cap = self.batch.max_batch_size;
        if targets.len() > cap {
            scrape_warn!(
                "Batch of {} targets exceeds limit {}; {} will be synthesized",
                targets.len(),
                cap,
                targets.len() - cap
            );
        }

        let mut dedupe = DedupeContext::new();
        let mut results = Vec::with_capacity(targets.len());
        for (index, target) in targets.into_iter().enumerate() {
            if index >= cap {
                results.push(self.over_cap(target, cap));
                continue;
            }

            let before = dedupe.clone();
            let guarded = AssertUnwindSafe(self.scrape_target(target.clone(), dedupe))
                .catch_unwind()
                .await;
            match guarded {
                Ok((next, result)) => {
                    dedupe = next;
                    results.push(result);
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    scrape_error!("Cascade for {} panicked: {}", target.url, message);
                    dedupe = before;
                    results.push(self.panicked(target, message));
                }
            }
        }

        let synthetic = results.iter().filter(|r| r.synthetic).count();
        scrape_info!(
            "Batch done: {} target(s), {} synthetic",
            results.len(),
            synthetic
        );
        results
    }

    async fn scrape_target(
        &self,
        target: ScrapeTarget,
        dedupe: DedupeContext,
    ) -> (DedupeContext, BatchResult) {
        let fallback_target = target.clone();
        let (mut state, effects) = self.controller.start(target);
        let effects = self.run_actor_phase(&mut state, effects).await;
        let mut result = self.resolve(state, effects, fallback_target).await;

        let before = result.items.len();
        let (dedupe, items) = dedupe.filter(std::mem::take(&mut result.items));
        if items.len() < before {
            scrape_info!(
                "Dropped {} duplicate item(s) for {}",
                before - items.len(),
                result.target.url
            );
        }
        result.items = items;

        scrape_info!(
            "Resolved {} via {:?} with {} item(s) after {} attempt(s)",
            result.target.url,
            result.final_source,
            result.items.len(),
            result.attempts.len()
        );
        (dedupe, result)
    }

    /// Races the actor cascade against the per-target budget. When the budget
    /// fires, the cascade is cancelled and given a grace period to report.
    async fn run_actor_phase(
        &self,
        state: &mut CascadeState,
        effects: Vec<Effect>,
    ) -> Vec<Effect> {
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let url = state.target().url.clone();

        let finished = {
            let mut drive = Box::pin(self.controller.drive(state, effects, &cancel));
            tokio::select! {
                effects = &mut drive => Some(effects),
                _ = tokio::time::sleep(self.batch.target_budget()) => {
                    scrape_warn!("Budget elapsed for {}; cancelling cascade", url);
                    cancel.cancel();
                    tokio::time::timeout(self.batch.cancel_grace(), &mut drive).await.ok()
                }
            }
        };

        match finished {
            Some(effects) => effects,
            None => {
                scrape_warn!("Cascade for {} did not wind down within grace", url);
                state.apply(Msg::DeadlineElapsed {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    /// Runs the direct and synthetic rungs until the state is done.
    async fn resolve(
        &self,
        mut state: CascadeState,
        effects: Vec<Effect>,
        target: ScrapeTarget,
    ) -> BatchResult {
        let mut next = effects.into_iter().next();
        while let Some(effect) = next.take() {
            let emitted = match effect {
                Effect::DirectFetch => {
                    let started = Instant::now();
                    let outcome = self.direct.fetch(state.target(), &(self.clock)()).await;
                    state.apply(Msg::DirectFinished {
                        outcome,
                        duration_ms: started.elapsed().as_millis() as u64,
                    })
                }
                Effect::Synthesize { reason } => {
                    let item = placeholder(state.target(), reason, &(self.clock)());
                    state.apply(Msg::Synthesized { item })
                }
                Effect::Finish | Effect::RunCandidate { .. } => Vec::new(),
            };
            next = emitted.into_iter().next();
        }

        let attempts = state.attempts().to_vec();
        match state.into_result() {
            Some(result) => result,
            None => self.stalled(target, attempts),
        }
    }

    fn stalled(&self, target: ScrapeTarget, attempts: Vec<AttemptRecord>) -> BatchResult {
        scrape_error!("Cascade for {} stopped without a result", target.url);
        let item = placeholder(&target, SynthesisReason::DirectUnreachable, &(self.clock)());
        BatchResult::synthetic(
            target,
            item,
            attempts,
            AttemptOutcome::Unreachable,
            Some("cascade stopped without a result".into()),
        )
    }

    fn over_cap(&self, target: ScrapeTarget, cap: usize) -> BatchResult {
        let item = placeholder(&target, SynthesisReason::BatchCapExceeded, &(self.clock)());
        BatchResult::synthetic(
            target,
            item,
            Vec::new(),
            AttemptOutcome::BatchCapExceeded,
            Some(format!("batch limited to {cap} targets")),
        )
    }

    fn panicked(&self, target: ScrapeTarget, message: String) -> BatchResult {
        let item = placeholder(&target, SynthesisReason::StagePanicked, &(self.clock)());
        BatchResult::synthetic(target, item, Vec::new(), AttemptOutcome::Panicked, Some(message))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
