use crate::{
    AttemptOutcome, AttemptRecord, AttemptSource, CandidateReport, CascadeState, DirectOutcome,
    Effect, FinalSource, Msg, Phase, SynthesisReason,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: CascadeState, msg: Msg) -> (CascadeState, Vec<Effect>) {
    let effects = state.apply(msg);
    (state, effects)
}

impl CascadeState {
    /// In-place form of [`update`], for drivers that keep the state borrowed
    /// across suspension points.
    pub fn apply(&mut self, msg: Msg) -> Vec<Effect> {
        match msg {
            Msg::CandidateFinished(report) => self.apply_candidate(report),
            Msg::DeadlineElapsed { elapsed_ms } => {
                let Some(actor) = self.current_candidate() else {
                    return Vec::new();
                };
                let record = AttemptRecord::new(
                    AttemptSource::Actor(actor.id.clone()),
                    AttemptOutcome::Cancelled,
                    elapsed_ms,
                )
                .with_error("per-target budget elapsed");
                self.record(record);
                self.enter(Phase::Direct);
                vec![Effect::DirectFetch]
            }
            Msg::DirectFinished {
                outcome,
                duration_ms,
            } => {
                if self.phase() != Phase::Direct {
                    return Vec::new();
                }
                match outcome {
                    DirectOutcome::Fetched { item } => {
                        self.record(AttemptRecord::new(
                            AttemptSource::Direct,
                            AttemptOutcome::Fetched,
                            duration_ms,
                        ));
                        self.finish(vec![item], FinalSource::Direct);
                        vec![Effect::Finish]
                    }
                    DirectOutcome::ProtectionDetected {
                        item,
                        status,
                        reason,
                    } => {
                        self.record(
                            AttemptRecord::new(
                                AttemptSource::Direct,
                                AttemptOutcome::ProtectionDetected { status },
                                duration_ms,
                            )
                            .with_error(reason),
                        );
                        self.finish(vec![item], FinalSource::Direct);
                        vec![Effect::Finish]
                    }
                    DirectOutcome::Unrecoverable { error } => {
                        self.record(
                            AttemptRecord::new(
                                AttemptSource::Direct,
                                AttemptOutcome::Unreachable,
                                duration_ms,
                            )
                            .with_error(error),
                        );
                        self.enter(Phase::Synthetic);
                        vec![Effect::Synthesize {
                            reason: SynthesisReason::DirectUnreachable,
                        }]
                    }
                }
            }
            Msg::Synthesized { item } => {
                if self.phase() != Phase::Synthetic {
                    return Vec::new();
                }
                self.record(AttemptRecord::new(
                    AttemptSource::Synthetic,
                    AttemptOutcome::Synthesized,
                    0,
                ));
                self.finish(vec![item], FinalSource::Synthetic);
                vec![Effect::Finish]
            }
        }
    }

    fn apply_candidate(&mut self, report: CandidateReport) -> Vec<Effect> {
        // Late reports (after the deadline moved us on) and reports for a
        // candidate that is not current are dropped.
        match self.current_candidate() {
            Some(actor) if actor.id == report.actor_id => {}
            _ => return Vec::new(),
        }

        let CandidateReport {
            actor_id,
            outcome,
            items,
            duration_ms,
            error,
        } = report;

        // Success needs at least one item; an empty payload is a failure.
        let outcome = match outcome {
            AttemptOutcome::Succeeded { .. } if items.is_empty() => AttemptOutcome::EmptyDataset,
            AttemptOutcome::Succeeded { .. } => AttemptOutcome::Succeeded { items: items.len() },
            other => other,
        };

        let mut record =
            AttemptRecord::new(AttemptSource::Actor(actor_id), outcome.clone(), duration_ms);
        record.error = error;
        self.record(record);

        match outcome {
            AttemptOutcome::Succeeded { .. } => {
                self.finish(items, FinalSource::Actor);
                vec![Effect::Finish]
            }
            AttemptOutcome::Cancelled => {
                self.enter(Phase::Direct);
                vec![Effect::DirectFetch]
            }
            _ => vec![self.advance_candidate()],
        }
    }
}
