pub mod batch;
pub mod loaders;
pub mod outcome;
pub mod prompt;
pub mod summary;

pub use batch::{BatchJob, BatchStatus, RequestCounts};
pub use loaders::{load_prompts, parse_planning_prompts};
pub use outcome::{
    ItemOutcome, Outcome, OutcomeKind, OutcomeSet, RawRecord, Reconciliation, SkippedRecord, Usage,
};
pub use prompt::{BatchRequestItem, ModelConfig, Prompt};
pub use summary::RunSummary;
