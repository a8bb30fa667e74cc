// Runners Module
// Process execution seam between orchestration and the operating system

pub mod shell;

#[cfg(test)]
pub mod recording;

pub use shell::{Shell, ShellRunner};

use std::collections::BTreeMap;
use std::path::PathBuf;

/// A fully described process to launch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute (looked up on PATH when not a path)
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Environment of the child process
    pub env: BTreeMap<String, String>,
    /// Start from an empty environment instead of inheriting ours
    pub clear_env: bool,
    /// Working directory (inherit when None)
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, env: BTreeMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn clear_env(mut self) -> Self {
        self.clear_env = true;
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The command line as a user would type it, for logs
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output collected while a process ran
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Exit code (None when killed by a signal or never started)
    pub exit_code: Option<i32>,
    /// Ctrl-C was received while the process ran
    pub interrupted: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.interrupted
    }

    /// stdout and stderr joined, for error reports
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
            (false, true) => self.stdout.clone(),
            _ => self.stderr.clone(),
        }
    }
}

/// Callback for handling output lines in real-time, `true` marks stderr
pub type OutputCallback = Box<dyn Fn(&str, bool) + Send + Sync>;

/// Trait for process runners
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture the output
    async fn output(&self, invocation: &Invocation) -> CommandOutput;

    /// Run to completion, forwarding every output line as it arrives
    async fn stream(&self, invocation: &Invocation, on_output: OutputCallback) -> CommandOutput;

    /// Run attached to the terminal (nothing is captured)
    async fn interactive(&self, invocation: &Invocation) -> CommandOutput;
}
