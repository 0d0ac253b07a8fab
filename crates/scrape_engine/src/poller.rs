use scrape_core::{PollSchedule, RunStatus};
use scrape_logging::{scrape_debug, scrape_info, scrape_warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{ActorBackend, RunHandle};

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Succeeded {
        dataset_id: Option<String>,
        polls: u32,
    },
    Failed {
        status: RunStatus,
        polls: u32,
    },
    /// Attempt cap or candidate budget reached while the run was not terminal.
    BudgetExhausted {
        last: RunStatus,
        polls: u32,
    },
    Cancelled {
        polls: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Poller {
    schedule: PollSchedule,
}

impl Poller {
    pub fn new(schedule: PollSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &PollSchedule {
        &self.schedule
    }

    /// Polls `handle` until it is terminal, the schedule runs out, or `cancel`
    /// fires. A failed status request consumes an attempt and polling goes
    /// on. Runs left behind (budget or cancellation) get a best-effort abort.
    ///
    /// The deadline is the smaller of the budget and the schedule's worst
    /// case, and it also bounds a status request that is still in flight.
    pub async fn poll(
        &self,
        backend: &dyn ActorBackend,
        handle: &RunHandle,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        let limit = self.schedule.budget.min(self.schedule.worst_case());
        let deadline = handle.started_at + limit;
        let mut status = RunStatus::Pending;
        let mut dataset_id = handle.dataset_id.clone();
        let mut polls = 0u32;

        for interval in self.schedule.intervals() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = interval.min(deadline - now);

            let snapshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    abort_quietly(backend, handle).await;
                    return PollOutcome::Cancelled { polls };
                }
                snapshot = tokio::time::timeout_at(deadline, async {
                    tokio::time::sleep(wait).await;
                    backend.run_status(handle).await
                }) => snapshot,
            };
            let Ok(snapshot) = snapshot else {
                scrape_warn!(
                    "Status check for run {} ({}) outlived the poll deadline",
                    handle.run_id,
                    handle.actor_id
                );
                break;
            };
            polls += 1;

            match snapshot {
                Ok(snapshot) => {
                    status = status.advance(snapshot.status);
                    if snapshot.dataset_id.is_some() {
                        dataset_id = snapshot.dataset_id;
                    }
                }
                Err(err) => {
                    scrape_warn!(
                        "Status check {} for run {} ({}) failed: {}",
                        polls,
                        handle.run_id,
                        handle.actor_id,
                        err
                    );
                    continue;
                }
            }

            scrape_debug!(
                "Run {} ({}) is {} after {} poll(s)",
                handle.run_id,
                handle.actor_id,
                status.as_str(),
                polls
            );
            if status == RunStatus::Succeeded {
                return PollOutcome::Succeeded { dataset_id, polls };
            }
            if status.is_failure() {
                return PollOutcome::Failed { status, polls };
            }
        }

        scrape_warn!(
            "Run {} ({}) still {} after {} poll(s); giving up",
            handle.run_id,
            handle.actor_id,
            status.as_str(),
            polls
        );
        abort_quietly(backend, handle).await;
        PollOutcome::BudgetExhausted {
            last: status,
            polls,
        }
    }
}

async fn abort_quietly(backend: &dyn ActorBackend, handle: &RunHandle) {
    match backend.abort_run(handle).await {
        Ok(()) => scrape_info!("Aborted run {} ({})", handle.run_id, handle.actor_id),
        Err(err) => scrape_warn!(
            "Abort of run {} ({}) failed: {}",
            handle.run_id,
            handle.actor_id,
            err
        ),
    }
}
