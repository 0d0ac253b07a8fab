use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Platform, RunStatus, ScrapeTarget};

/// One extracted content unit handed to downstream scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedItem {
    pub url: String,
    pub title: String,
    pub content: String,
    pub platform: Platform,
    /// Actor id, `direct`, or `synthetic`.
    pub source: String,
    pub extracted_at: String,
    #[serde(default)]
    pub synthetic: bool,
    /// Set when the item only records that the site refused automated access.
    #[serde(default)]
    pub protection_detected: bool,
    /// Source specific fields such as `propertyData` or `buyerSignals`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Which rung of the degradation ladder produced the final items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalSource {
    Actor,
    Direct,
    Synthetic,
}

/// Who performed one cascade step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptSource {
    Actor(String),
    Direct,
    Synthetic,
}

impl AttemptSource {
    pub fn label(&self) -> &str {
        match self {
            AttemptSource::Actor(id) => id,
            AttemptSource::Direct => "direct",
            AttemptSource::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for AttemptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Actor run produced items.
    Succeeded { items: usize },
    /// Start request failed or returned no run id.
    SubmitFailed,
    /// Run reached FAILED, ABORTED or TIMED_OUT.
    TerminalFailure { status: RunStatus },
    /// Attempt cap or candidate budget reached while the run was not terminal.
    PollBudgetExhausted { polls: u32 },
    /// Run succeeded without a dataset reference.
    MissingDataset,
    /// Run succeeded but its dataset held no usable items.
    EmptyDataset,
    /// Dataset items could not be retrieved.
    FetchFailed,
    /// The per-target budget elapsed while this step was running.
    Cancelled,
    /// Direct fetch returned extractable content.
    Fetched,
    /// Direct fetch reached the site but got no usable content.
    ProtectionDetected { status: Option<u16> },
    /// Direct fetch could not obtain any response.
    Unreachable,
    Synthesized,
    /// Target fell outside the configured batch size.
    BatchCapExceeded,
    /// A stage panicked; caught at the batch boundary.
    Panicked,
}

impl AttemptOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            AttemptOutcome::Succeeded { .. } => "succeeded",
            AttemptOutcome::SubmitFailed => "submit_failed",
            AttemptOutcome::TerminalFailure { .. } => "terminal_failure",
            AttemptOutcome::PollBudgetExhausted { .. } => "poll_budget_exhausted",
            AttemptOutcome::MissingDataset => "missing_dataset",
            AttemptOutcome::EmptyDataset => "empty_dataset",
            AttemptOutcome::FetchFailed => "fetch_failed",
            AttemptOutcome::Cancelled => "cancelled",
            AttemptOutcome::Fetched => "fetched",
            AttemptOutcome::ProtectionDetected { .. } => "protection_detected",
            AttemptOutcome::Unreachable => "unreachable",
            AttemptOutcome::Synthesized => "synthesized",
            AttemptOutcome::BatchCapExceeded => "batch_cap_exceeded",
            AttemptOutcome::Panicked => "panicked",
        }
    }

    /// `true` for outcomes that yielded items for the target.
    pub fn produced_items(&self) -> bool {
        matches!(
            self,
            AttemptOutcome::Succeeded { .. }
                | AttemptOutcome::Fetched
                | AttemptOutcome::ProtectionDetected { .. }
                | AttemptOutcome::Synthesized
        )
    }
}

/// Audit entry for one step of a target's cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub source: AttemptSource,
    pub outcome: AttemptOutcome,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttemptRecord {
    pub fn new(source: AttemptSource, outcome: AttemptOutcome, duration_ms: u64) -> Self {
        Self {
            source,
            outcome,
            duration_ms,
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Final answer for one target. Exactly one exists per input target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub target: ScrapeTarget,
    pub items: Vec<ScrapedItem>,
    pub attempts: Vec<AttemptRecord>,
    pub final_source: FinalSource,
    pub synthetic: bool,
}

impl BatchResult {
    pub fn new(
        target: ScrapeTarget,
        items: Vec<ScrapedItem>,
        attempts: Vec<AttemptRecord>,
        final_source: FinalSource,
    ) -> Self {
        Self {
            target,
            items,
            attempts,
            synthetic: final_source == FinalSource::Synthetic,
            final_source,
        }
    }

    /// Result made of one synthetic item, appending its own attempt record.
    pub fn synthetic(
        target: ScrapeTarget,
        item: ScrapedItem,
        mut attempts: Vec<AttemptRecord>,
        trigger: AttemptOutcome,
        error: Option<String>,
    ) -> Self {
        let mut record = AttemptRecord::new(AttemptSource::Synthetic, trigger, 0);
        record.error = error;
        attempts.push(record);
        Self::new(target, vec![item], attempts, FinalSource::Synthetic)
    }
}
