// Riot Service Library
// Declarative Python virtualenv matrices: parsing, expansion, building and running

pub mod error;
pub mod execution;
pub mod interpreter;
pub mod riotfile;
pub mod runners;
pub mod settings;
pub mod utils;
pub mod venv;

// Re-export commonly used types
pub use error::{RiotError, RiotResult};

// Re-export riotfile types
pub use riotfile::{
    ConfigError, ConfigErrorKind, ConfigResult, RiotfileParser, VenvSpec, DEFAULT_RIOTFILE,
};

// Re-export execution types
pub use execution::{
    progress_channel, BuildOptions, BuildPhase, EnvironmentInstance, ExecutionEvent,
    InstanceFilter, InstanceResult, LogLevel, MatrixExpander, Outcome, ProgressReceiver,
    ProgressSender, RunOptions, RunReport, Session, MATCH_ALL,
};

pub use interpreter::{Interpreter, ResolvedInterpreter};
pub use runners::{CommandOutput, CommandRunner, Invocation, Shell, ShellRunner};
pub use settings::RiotSettings;
pub use venv::{VirtualEnv, WheelSource};
