// Service errors
// Failure classes surfaced by loading, resolving, building and running

use crate::riotfile::ConfigError;
use crate::runners::{CommandOutput, Invocation};

use std::io;
use thiserror::Error;

/// Errors produced by the riot service
#[derive(Debug, Error)]
pub enum RiotError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Python interpreter '{0}' not found")]
    InterpreterNotFound(String),

    #[error("No wheel for '{package}' found in '{source_path}'{}", detail_suffix(.detail))]
    WheelNotFound {
        package: String,
        source_path: String,
        detail: Option<String>,
    },

    #[error("Cannot determine the package name for the wheel install: set RIOT_PACKAGE_NAME or add a name to pyproject.toml, setup.cfg or setup.py")]
    PackageName,

    #[error("{message} (exit code {})", exit_code_str(.exit_code))]
    CommandFailed {
        message: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("Interrupted while running '{0}'")]
    Interrupted(String),

    #[error("No venv instance matches '{0}'")]
    UnknownInstance(String),

    #[error("'{ident}' is ambiguous, it matches: {}", .candidates.join(", "))]
    AmbiguousInstance {
        ident: String,
        candidates: Vec<String>,
    },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) if !detail.trim().is_empty() => format!(":\n{}", detail.trim_end()),
        _ => String::new(),
    }
}

fn exit_code_str(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl RiotError {
    pub fn command_failed(
        message: impl Into<String>,
        exit_code: Option<i32>,
        output: impl Into<String>,
    ) -> Self {
        RiotError::CommandFailed {
            message: message.into(),
            exit_code,
            output: output.into(),
        }
    }

    /// Error for a command that did not succeed: interrupted or failed
    pub fn from_output(
        message: impl Into<String>,
        invocation: &Invocation,
        output: &CommandOutput,
    ) -> Self {
        if output.interrupted {
            RiotError::Interrupted(invocation.display())
        } else {
            RiotError::command_failed(message, output.exit_code, output.combined())
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, RiotError::Interrupted(_))
    }

    /// Process exit code to report for this error, when it came from a command
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RiotError::CommandFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

/// Result type for service operations
pub type RiotResult<T> = Result<T, RiotError>;
