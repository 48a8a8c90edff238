pub mod batch_flow;
pub mod stage;

pub use batch_flow::{BatchFlow, BatchRun};
pub use stage::Stage;
