//! Python interpreter hints and their resolution on the host.
//!
//! A hint is what the riotfile says (`3.9`, `pypy3`, `/opt/py/bin/python`).
//! Resolution finds the executable and asks it for its version; results are
//! memoised in an [`InterpreterCache`] for the lifetime of a session.

use crate::error::{RiotError, RiotResult};
use crate::runners::{CommandRunner, Invocation};
use crate::settings::RiotSettings;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// An interpreter as requested by the riotfile
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interpreter {
    hint: String,
}

impl Interpreter {
    pub fn new(hint: impl Into<String>) -> Self {
        Self { hint: hint.into() }
    }

    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// Locate the executable for this hint.
    ///
    /// Tried in order: an existing path, an executable named like the hint,
    /// then `python<hint>`.
    pub fn locate(&self) -> Option<PathBuf> {
        let as_path = Path::new(&self.hint);
        if as_path.is_file() {
            return Some(as_path.to_path_buf());
        }

        [self.hint.clone(), format!("python{}", self.hint)]
            .iter()
            .find_map(|candidate| which::which(candidate).ok())
    }

    /// Resolve the executable and its version
    pub async fn resolve(&self, runner: &dyn CommandRunner) -> RiotResult<ResolvedInterpreter> {
        let executable = self
            .locate()
            .ok_or_else(|| RiotError::InterpreterNotFound(self.hint.clone()))?;

        let output = runner
            .output(&Invocation::new(executable.to_string_lossy()).arg("--version"))
            .await;
        if !output.success() {
            debug!(hint = %self.hint, ?executable, "interpreter did not report a version");
            return Err(RiotError::InterpreterNotFound(self.hint.clone()));
        }

        // Python 2 prints its version on stderr
        let version = parse_version(&output.stdout)
            .or_else(|| parse_version(&output.stderr))
            .ok_or_else(|| RiotError::InterpreterNotFound(self.hint.clone()))?;

        debug!(hint = %self.hint, ?executable, %version, "resolved interpreter");
        Ok(ResolvedInterpreter {
            interpreter: self.clone(),
            executable,
            version,
        })
    }
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hint)
    }
}

/// Extract `X.Y.Z` from `Python X.Y.Z`
fn parse_version(output: &str) -> Option<String> {
    let line = output.lines().find(|l| l.trim_start().starts_with("Python "))?;
    let version = line.trim().rsplit(' ').next()?;
    let numeric: Vec<&str> = version
        .split('.')
        .take(3)
        .map(|part| {
            let end = part
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(part.len());
            &part[..end]
        })
        .collect();

    if numeric.is_empty() || numeric.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(numeric.join("."))
}

/// An interpreter found on this host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInterpreter {
    pub interpreter: Interpreter,
    pub executable: PathBuf,
    /// `major.minor.micro`
    pub version: String,
}

impl ResolvedInterpreter {
    pub fn hint(&self) -> &str {
        self.interpreter.hint()
    }

    /// Path of the base virtualenv of this interpreter
    pub fn base_venv_path(&self, settings: &RiotSettings) -> PathBuf {
        settings.riot_folder.join(format!(
            "{}{}",
            settings.venv_prefix,
            self.version.replace('.', "")
        ))
    }
}

impl fmt::Display for ResolvedInterpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Interpreter(_hint='{}', {} at {})",
            self.interpreter.hint(),
            self.version,
            self.executable.display()
        )
    }
}

/// Per-session memo of interpreter resolutions, failures included
#[derive(Default)]
pub struct InterpreterCache {
    resolved: Mutex<HashMap<Interpreter, Option<ResolvedInterpreter>>>,
}

impl InterpreterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(
        &self,
        interpreter: &Interpreter,
        runner: &dyn CommandRunner,
    ) -> RiotResult<ResolvedInterpreter> {
        let mut resolved = self.resolved.lock().await;
        if let Some(entry) = resolved.get(interpreter) {
            return entry
                .clone()
                .ok_or_else(|| RiotError::InterpreterNotFound(interpreter.hint().to_string()));
        }

        let result = interpreter.resolve(runner).await;
        resolved.insert(interpreter.clone(), result.as_ref().ok().cloned());
        result
    }
}
