use serde::{Deserialize, Serialize};

use crate::ActorDescriptor;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Submit, poll and fetch one candidate.
    RunCandidate { actor: ActorDescriptor },
    /// All candidates are exhausted; try a plain HTTP fetch.
    DirectFetch,
    /// Nothing real could be extracted; fabricate the placeholder.
    Synthesize { reason: SynthesisReason },
    /// The target has a result.
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisReason {
    DirectUnreachable,
    BatchCapExceeded,
    StagePanicked,
}
