// Run Report
// Per-instance outcomes and the aggregate summary of a run

use std::fmt;
use std::time::Duration;

/// Output markers that flag an instance in the summary
const WARNING_MARKERS: &[&str] = &[
    "deprecated",
    "deprecation",
    "warning",
    "no longer maintained",
    "not maintained",
    "did you mean",
];

/// Whether captured output contains anything worth flagging
pub fn has_warnings(output: &str) -> bool {
    let lower = output.to_lowercase();
    WARNING_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Final state of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
    Interrupted,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
            Outcome::Interrupted => "interrupted",
        };
        write!(f, "{}", label)
    }
}

/// Result of one instance
#[derive(Debug, Clone)]
pub struct InstanceResult {
    pub name: String,
    pub short_hash: String,
    /// One-line description (name, env, interpreter, packages)
    pub summary: String,
    pub outcome: Outcome,
    pub exit_code: Option<i32>,
    pub duration: Duration,
    /// Output contained deprecation or warning markers
    pub warnings: bool,
    /// Why the instance failed or was skipped, when not a plain exit code
    pub message: Option<String>,
    /// False for instances left out by the selection
    pub selected: bool,
}

impl InstanceResult {
    /// Result of an instance outside the selection
    pub fn not_selected(
        name: impl Into<String>,
        short_hash: impl Into<String>,
        summary: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            short_hash: short_hash.into(),
            summary: summary.into(),
            outcome: Outcome::Skipped,
            exit_code: None,
            duration: Duration::ZERO,
            warnings: false,
            message: Some(reason.into()),
            selected: false,
        }
    }
}

/// Aggregate of a `run`
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub results: Vec<InstanceResult>,
    pub duration: Duration,
}

impl RunReport {
    /// Results of the instances the selection picked
    pub fn selected(&self) -> impl Iterator<Item = &InstanceResult> {
        self.results.iter().filter(|r| r.selected)
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn passed(&self) -> usize {
        self.count(Outcome::Passed)
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(Outcome::Skipped)
    }

    pub fn interrupted(&self) -> bool {
        self.count(Outcome::Interrupted) > 0
    }

    pub fn warned(&self) -> usize {
        self.results.iter().filter(|r| r.warnings).count()
    }

    /// True when nothing failed or was interrupted
    pub fn success(&self) -> bool {
        self.failed() == 0 && !self.interrupted()
    }

    /// Exit status for the process
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }
}
