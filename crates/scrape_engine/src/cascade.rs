use std::collections::VecDeque;
use std::sync::Arc;

use scrape_core::{
    normalize_items, ActorDescriptor, AttemptOutcome, CandidateReport, CandidateTable,
    CascadeState, Effect, Msg, ScrapeTarget, ScrapedItem,
};
use scrape_logging::{scrape_info, scrape_warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::poller::{PollOutcome, Poller};
use crate::{ActorBackend, Clock};

/// Drives the actor rung of the cascade: runs candidates one at a time and
/// feeds their reports into [`CascadeState`].
pub struct CascadeController {
    backend: Arc<dyn ActorBackend>,
    poller: Poller,
    table: CandidateTable,
    item_limit: usize,
    max_content_chars: usize,
    clock: Clock,
}

impl CascadeController {
    pub fn new(
        backend: Arc<dyn ActorBackend>,
        poller: Poller,
        table: CandidateTable,
        item_limit: usize,
        max_content_chars: usize,
        clock: Clock,
    ) -> Self {
        Self {
            backend,
            poller,
            table,
            item_limit,
            max_content_chars,
            clock,
        }
    }

    pub fn table(&self) -> &CandidateTable {
        &self.table
    }

    pub fn start(&self, target: ScrapeTarget) -> (CascadeState, Vec<Effect>) {
        let candidates = self.table.select(&target);
        scrape_info!(
            "Cascade for {} ({}): {}",
            target.url,
            target.platform.label(),
            candidates
                .iter()
                .map(|a| a.id.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );
        CascadeState::start(target, candidates)
    }

    /// Executes candidate effects until the state leaves the actor phase and
    /// returns the effects it emitted at that point.
    pub async fn drive(
        &self,
        state: &mut CascadeState,
        effects: Vec<Effect>,
        cancel: &CancellationToken,
    ) -> Vec<Effect> {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::RunCandidate { actor } => {
                    let report = self.run_candidate(&actor, state.target(), cancel).await;
                    queue.extend(state.apply(Msg::CandidateFinished(report)));
                }
                other => {
                    queue.push_front(other);
                    break;
                }
            }
        }
        queue.into()
    }

    /// Submit, poll and fetch one candidate. Never fails; every problem ends
    /// up in the report's outcome.
    pub async fn run_candidate(
        &self,
        actor: &ActorDescriptor,
        target: &ScrapeTarget,
        cancel: &CancellationToken,
    ) -> CandidateReport {
        let started = Instant::now();
        let (outcome, items, error) = self.attempt(actor, target, cancel).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &error {
            Some(error) => scrape_warn!(
                "Candidate {} for {}: {} ({})",
                actor.id,
                target.url,
                outcome.code(),
                error
            ),
            None => scrape_info!(
                "Candidate {} for {}: {} with {} item(s)",
                actor.id,
                target.url,
                outcome.code(),
                items.len()
            ),
        }
        CandidateReport {
            actor_id: actor.id.clone(),
            outcome,
            items,
            duration_ms,
            error,
        }
    }

    async fn attempt(
        &self,
        actor: &ActorDescriptor,
        target: &ScrapeTarget,
        cancel: &CancellationToken,
    ) -> (AttemptOutcome, Vec<ScrapedItem>, Option<String>) {
        let submitted = tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled("before submission"),
            submitted = self.backend.start_run(actor, target) => submitted,
        };
        let handle = match submitted {
            Ok(handle) => handle,
            Err(err) => return (AttemptOutcome::SubmitFailed, Vec::new(), Some(err.to_string())),
        };

        let dataset_id = match self.poller.poll(self.backend.as_ref(), &handle, cancel).await {
            PollOutcome::Succeeded {
                dataset_id: Some(dataset_id),
                ..
            } => dataset_id,
            PollOutcome::Succeeded {
                dataset_id: None, ..
            } => {
                return (
                    AttemptOutcome::MissingDataset,
                    Vec::new(),
                    Some(format!("run {} succeeded without a dataset", handle.run_id)),
                )
            }
            PollOutcome::Failed { status, .. } => {
                return (
                    AttemptOutcome::TerminalFailure { status },
                    Vec::new(),
                    Some(format!("run {} ended {}", handle.run_id, status.as_str())),
                )
            }
            PollOutcome::BudgetExhausted { last, polls } => {
                return (
                    AttemptOutcome::PollBudgetExhausted { polls },
                    Vec::new(),
                    Some(format!(
                        "run {} still {} after {} poll(s)",
                        handle.run_id,
                        last.as_str(),
                        polls
                    )),
                )
            }
            PollOutcome::Cancelled { .. } => return cancelled("while polling"),
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return cancelled("while fetching the dataset"),
            fetched = self.backend.dataset_items(&dataset_id, self.item_limit) => fetched,
        };
        let raw = match fetched {
            Ok(raw) => raw,
            Err(err) => return (AttemptOutcome::FetchFailed, Vec::new(), Some(err.to_string())),
        };

        let raw_len = raw.len();
        let extracted_at = (self.clock)();
        let items = normalize_items(raw, target, &actor.id, &extracted_at, self.max_content_chars);
        if items.is_empty() {
            return (
                AttemptOutcome::EmptyDataset,
                Vec::new(),
                Some(format!("dataset {dataset_id} held no usable items ({raw_len} raw)")),
            );
        }
        (
            AttemptOutcome::Succeeded { items: items.len() },
            items,
            None,
        )
    }
}

fn cancelled(stage: &str) -> (AttemptOutcome, Vec<ScrapedItem>, Option<String>) {
    (
        AttemptOutcome::Cancelled,
        Vec::new(),
        Some(format!("cancelled {stage}")),
    )
}
