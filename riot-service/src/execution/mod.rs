// Execution Engine Module
// Matrix expansion, instance selection, and the build-and-run session

pub mod events;
pub mod filter;
pub mod instance;
pub mod matrix;
pub mod report;
pub mod session;

// Re-export key types
pub use events::{progress_channel, BuildPhase, ExecutionEvent, LogLevel, ProgressReceiver, ProgressSender};
pub use filter::{InstanceFilter, MATCH_ALL};
pub use instance::{EnvironmentInstance, CMDARGS_PLACEHOLDER};
pub use matrix::{expand_specs, MatrixExpander};
pub use report::{InstanceResult, Outcome, RunReport};
pub use session::{BuildOptions, RunOptions, Session, ALWAYS_PASS_ENV};
