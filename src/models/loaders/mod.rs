pub mod prompt_loader;

pub use prompt_loader::{load_prompts, parse_planning_prompts};
