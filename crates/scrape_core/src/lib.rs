//! Scrape cascade core: domain types, candidate selection, and the pure
//! cascade state machine. Nothing in this crate performs I/O.
mod actor;
mod candidates;
mod dedupe;
mod effect;
mod item;
mod msg;
mod normalize;
mod retry;
mod schedule;
mod state;
mod synthetic;
mod target;
mod text;
mod update;

pub use actor::{ActorDescriptor, ActorInput, InputShape, ResourceLimits, RunStatus};
pub use candidates::{CandidateTable, DomainRule};
pub use dedupe::{normalize_url_for_dedupe, DedupeContext};
pub use effect::{Effect, SynthesisReason};
pub use item::{
    AttemptOutcome, AttemptRecord, AttemptSource, BatchResult, FinalSource, ScrapedItem,
};
pub use msg::{CandidateReport, DirectOutcome, Msg};
pub use normalize::normalize_items;
pub use retry::{is_transient_status, RetryPolicy};
pub use schedule::PollSchedule;
pub use state::{CascadeState, Phase};
pub use synthetic::{placeholder, SYNTHETIC_SOURCE};
pub use target::{Platform, ScrapeTarget, TargetContext};
pub use text::truncate_chars;
pub use update::update;
