use crate::{AttemptOutcome, ScrapedItem};

/// What happened when one candidate was driven through submit, poll and fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateReport {
    pub actor_id: String,
    pub outcome: AttemptOutcome,
    pub items: Vec<ScrapedItem>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Outcome of the direct fetch rung.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectOutcome {
    /// Page fetched and text extracted.
    Fetched { item: ScrapedItem },
    /// The site answered (or stalled) without usable content; `item` explains it.
    ProtectionDetected {
        item: ScrapedItem,
        status: Option<u16>,
        reason: String,
    },
    /// No response could be obtained at all.
    Unrecoverable { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// A candidate finished (successfully or not).
    CandidateFinished(CandidateReport),
    /// The per-target budget elapsed before the actor cascade reported back.
    DeadlineElapsed { elapsed_ms: u64 },
    /// The direct fetch finished.
    DirectFinished {
        outcome: DirectOutcome,
        duration_ms: u64,
    },
    /// The synthetic placeholder was generated.
    Synthesized { item: ScrapedItem },
}
