//! Virtual environments: creation and installs.
//!
//! Every pip call goes through the [`CommandRunner`] seam with captured
//! output, so a failed install surfaces as [`RiotError::CommandFailed`]
//! carrying what pip printed.

pub mod wheel;

pub use wheel::{package_name, WheelSource};

use crate::error::{RiotError, RiotResult};
use crate::interpreter::ResolvedInterpreter;
use crate::runners::{CommandRunner, Invocation};
use crate::utils::{has_python_project, join_paths, pep_dep};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A virtual environment directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnv {
    path: PathBuf,
}

impl VirtualEnv {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    pub fn bin_path(&self) -> PathBuf {
        if cfg!(windows) {
            self.path.join("Scripts")
        } else {
            self.path.join("bin")
        }
    }

    pub fn python(&self) -> PathBuf {
        self.bin_path().join("python")
    }

    /// Variables that activate this venv, prepending it to `path`
    pub fn run_env(&self, path: Option<&str>) -> BTreeMap<String, String> {
        let bin = self.bin_path().to_string_lossy().into_owned();
        let mut env = BTreeMap::new();
        env.insert(
            "VIRTUAL_ENV".to_string(),
            self.path.to_string_lossy().into_owned(),
        );
        env.insert(
            "PATH".to_string(),
            join_paths([Some(bin.as_str()), path]),
        );
        env
    }

    /// Create the venv with `py`.
    ///
    /// An existing directory is kept unless `recreate` is set, in which case
    /// it is removed first. Returns whether a new venv was created.
    pub async fn create(
        &self,
        py: &ResolvedInterpreter,
        recreate: bool,
        runner: &dyn CommandRunner,
    ) -> RiotResult<bool> {
        if self.exists() {
            if !recreate {
                debug!(path = ?self.path, "reusing venv");
                return Ok(false);
            }
            info!(path = ?self.path, "removing venv for recreation");
            tokio::fs::remove_dir_all(&self.path).await?;
        }

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(path = ?self.path, python = %py, "creating venv");
        let invocation = Invocation::new(py.executable.to_string_lossy())
            .args(["-m", "venv"])
            .arg(self.path.to_string_lossy());
        let output = runner.output(&invocation).await;
        if !output.success() {
            return Err(RiotError::from_output(
                format!("Failed to create venv '{}'", self.path.display()),
                &invocation,
                &output,
            ));
        }
        Ok(true)
    }

    /// `python -m pip <subcommand> --disable-pip-version-check ...` in this venv
    pub fn pip(&self, subcommand: &str) -> Invocation {
        Invocation::new(self.python().to_string_lossy())
            .args(["-m", "pip", subcommand, "--disable-pip-version-check"])
            .envs(self.run_env(std::env::var("PATH").ok().as_deref()))
    }

    /// Install the declared packages
    pub async fn install_packages(
        &self,
        pkgs: &[(String, String)],
        runner: &dyn CommandRunner,
    ) -> RiotResult<()> {
        if pkgs.is_empty() {
            return Ok(());
        }
        let specs: Vec<String> = pkgs
            .iter()
            .map(|(name, constraint)| pep_dep(name, constraint))
            .collect();

        info!(path = ?self.path, pkgs = %specs.join(" "), "installing packages");
        self.run_pip(self.pip("install").args(specs), "Failed to install packages", runner)
            .await
    }

    /// Install a compiled requirements file with `-r`
    pub async fn install_requirements(
        &self,
        requirements: &Path,
        runner: &dyn CommandRunner,
    ) -> RiotResult<()> {
        info!(path = ?self.path, requirements = ?requirements, "installing requirements");
        let invocation = self
            .pip("install")
            .arg("-r")
            .arg(requirements.to_string_lossy());
        self.run_pip(invocation, "Failed to install requirements", runner)
            .await
    }

    /// Install the project in `project_dir` in editable mode.
    ///
    /// Returns false (with a warning) when there is nothing to install.
    pub async fn install_project(
        &self,
        project_dir: &Path,
        runner: &dyn CommandRunner,
    ) -> RiotResult<bool> {
        if !has_python_project(project_dir) {
            warn!(
                dir = ?project_dir,
                "no pyproject.toml, setup.py or setup.cfg found, skipping dev install"
            );
            return Ok(false);
        }

        info!(path = ?self.path, "installing project in editable mode");
        let invocation = self.pip("install").args(["-e", "."]).working_dir(project_dir);
        self.run_pip(invocation, "Failed to install the project", runner)
            .await?;
        Ok(true)
    }

    /// Install a wheel file
    pub async fn install_wheel(&self, wheel: &Path, runner: &dyn CommandRunner) -> RiotResult<()> {
        info!(path = ?self.path, wheel = ?wheel, "installing wheel");
        let invocation = self.pip("install").arg(wheel.to_string_lossy());
        self.run_pip(invocation, "Failed to install wheel", runner).await
    }

    async fn run_pip(
        &self,
        invocation: Invocation,
        message: &str,
        runner: &dyn CommandRunner,
    ) -> RiotResult<()> {
        debug!(command = %invocation.display(), "pip");
        let output = runner.output(&invocation).await;
        if output.success() {
            Ok(())
        } else {
            Err(RiotError::from_output(
                format!("{} in '{}'", message, self.path.display()),
                &invocation,
                &output,
            ))
        }
    }
}
