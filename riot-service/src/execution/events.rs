// Execution Events
// Progress reporting and event types for a riot run

use crate::execution::report::Outcome;

use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Steps taken while preparing a virtual environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildPhase {
    /// A venv directory is being created
    CreatingVenv { path: PathBuf },
    /// An existing venv directory is reused as is
    ReusingVenv { path: PathBuf },
    /// The project is installed in editable mode
    InstallingProject,
    /// The project is installed from a pre-built wheel
    InstallingWheel { source: String },
    /// Declared packages are installed
    InstallingPackages { pkgs: String },
    /// Packages are pinned with pip-tools
    CompilingRequirements { path: PathBuf },
    /// A compiled requirements file is installed
    InstallingRequirements { path: PathBuf },
}

/// Events emitted during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Run started with the number of selected instances
    RunStarted { total: usize },

    /// Run finished
    RunCompleted {
        passed: usize,
        failed: usize,
        skipped: usize,
        duration: Duration,
    },

    /// An instance is about to be built and run
    InstanceStarted {
        index: usize,
        total: usize,
        short_hash: String,
        summary: String,
    },

    /// Progress while building the instance's venv
    Building { short_hash: String, phase: BuildPhase },

    /// The command is starting
    CommandStarted { short_hash: String, command: String },

    /// Command output (stdout/stderr)
    InstanceOutput {
        short_hash: String,
        line: String,
        is_error: bool,
    },

    /// Instance finished
    InstanceCompleted {
        short_hash: String,
        outcome: Outcome,
        duration: Duration,
        exit_code: Option<i32>,
    },

    /// Instance was not run
    InstanceSkipped { short_hash: String, reason: String },

    /// Log message (info, warning, error)
    Log { level: LogLevel, message: String },
}

/// Log level for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl ExecutionEvent {
    pub fn building(short_hash: impl Into<String>, phase: BuildPhase) -> Self {
        Self::Building {
            short_hash: short_hash.into(),
            phase,
        }
    }

    pub fn output(short_hash: impl Into<String>, line: impl Into<String>, is_error: bool) -> Self {
        Self::InstanceOutput {
            short_hash: short_hash.into(),
            line: line.into(),
            is_error,
        }
    }

    pub fn skipped(short_hash: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InstanceSkipped {
            short_hash: short_hash.into(),
            reason: reason.into(),
        }
    }

    /// Create an info log event
    pub fn info(message: impl Into<String>) -> Self {
        Self::Log {
            level: LogLevel::Info,
            message: message.into(),
        }
    }

    /// Create a warning log event
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Log {
            level: LogLevel::Warning,
            message: message.into(),
        }
    }

    /// Create an error log event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Log {
            level: LogLevel::Error,
            message: message.into(),
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_channel() {
        let (tx, mut rx) = progress_channel();

        tx.send_event(ExecutionEvent::RunStarted { total: 2 });
        tx.send_event(ExecutionEvent::output("abc1234", "collected 3 items", false));

        let event1 = rx.recv().await.unwrap();
        assert!(matches!(event1, ExecutionEvent::RunStarted { total: 2 }));

        let event2 = rx.recv().await.unwrap();
        if let ExecutionEvent::InstanceOutput { line, is_error, .. } = event2 {
            assert_eq!(line, "collected 3 items");
            assert!(!is_error);
        } else {
            panic!("Expected InstanceOutput event");
        }
    }

    #[test]
    fn test_optional_sender_is_silent_when_absent() {
        let sender: Option<ProgressSender> = None;
        sender.send_event(ExecutionEvent::info("nobody listens"));
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (tx, rx) = progress_channel();
        drop(rx);
        tx.send_event(ExecutionEvent::warning("dropped"));
    }
}
