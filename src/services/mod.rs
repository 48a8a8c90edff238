pub mod batch_poller;
pub mod batch_submitter;
pub mod result_classifier;
pub mod result_writer;

pub use batch_poller::{Backoff, BackoffPolicy, BatchPoller, QueryErrorPolicy};
pub use batch_submitter::BatchSubmitter;
pub use result_classifier::{classify, collect_outcomes, UNKNOWN_ERROR};
pub use result_writer::{sanitize_file_stem, ResultWriter};
