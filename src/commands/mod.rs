//! Orchestration of the operations exposed on the command line.

mod diff;
mod generate;
mod recover;

pub use diff::diff_files;
pub use generate::{generate_config, GenerateOptions, GenerateOutcome};
pub use recover::{recover_templates, RecoverOptions, RecoveredTemplate};
