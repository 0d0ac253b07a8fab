use crate::{
    ActorDescriptor, AttemptRecord, BatchResult, Effect, FinalSource, ScrapeTarget, ScrapedItem,
};

/// Which rung of the degradation ladder a target is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Actors,
    Direct,
    Synthetic,
    Done,
}

/// Cascade progress for one target. Advanced only through [`crate::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeState {
    target: ScrapeTarget,
    candidates: Vec<ActorDescriptor>,
    cursor: usize,
    phase: Phase,
    attempts: Vec<AttemptRecord>,
    items: Vec<ScrapedItem>,
    final_source: Option<FinalSource>,
}

impl CascadeState {
    /// Creates the state and the first effect: the first candidate, or the
    /// direct fetch when there are no candidates.
    pub fn start(target: ScrapeTarget, candidates: Vec<ActorDescriptor>) -> (Self, Vec<Effect>) {
        let (phase, effect) = match candidates.first() {
            Some(actor) => (
                Phase::Actors,
                Effect::RunCandidate {
                    actor: actor.clone(),
                },
            ),
            None => (Phase::Direct, Effect::DirectFetch),
        };
        let state = Self {
            target,
            candidates,
            cursor: 0,
            phase,
            attempts: Vec::new(),
            items: Vec::new(),
            final_source: None,
        };
        (state, vec![effect])
    }

    pub fn target(&self) -> &ScrapeTarget {
        &self.target
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    pub fn candidates(&self) -> &[ActorDescriptor] {
        &self.candidates
    }

    /// The candidate currently running, if the actor phase is active.
    pub fn current_candidate(&self) -> Option<&ActorDescriptor> {
        if self.phase == Phase::Actors {
            self.candidates.get(self.cursor)
        } else {
            None
        }
    }

    /// The final result, once the state reached [`Phase::Done`].
    pub fn into_result(self) -> Option<BatchResult> {
        let final_source = self.final_source?;
        if self.phase != Phase::Done {
            return None;
        }
        Some(BatchResult::new(
            self.target,
            self.items,
            self.attempts,
            final_source,
        ))
    }

    pub(crate) fn record(&mut self, record: AttemptRecord) {
        self.attempts.push(record);
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Moves to the next candidate, or to the direct fetch when none is left.
    pub(crate) fn advance_candidate(&mut self) -> Effect {
        self.cursor += 1;
        match self.candidates.get(self.cursor) {
            Some(actor) => Effect::RunCandidate {
                actor: actor.clone(),
            },
            None => {
                self.phase = Phase::Direct;
                Effect::DirectFetch
            }
        }
    }

    pub(crate) fn finish(&mut self, items: Vec<ScrapedItem>, source: FinalSource) {
        self.items = items;
        self.final_source = Some(source);
        self.phase = Phase::Done;
    }
}
