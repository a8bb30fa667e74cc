// Session
// Resolves, builds and runs environment instances of one riotfile

use crate::error::{RiotError, RiotResult};
use crate::execution::events::{BuildPhase, EventSender, ExecutionEvent, ProgressSender};
use crate::execution::filter::InstanceFilter;
use crate::execution::instance::EnvironmentInstance;
use crate::execution::matrix::MatrixExpander;
use crate::execution::report::{has_warnings, InstanceResult, Outcome, RunReport};
use crate::interpreter::{Interpreter, InterpreterCache, ResolvedInterpreter};
use crate::riotfile::{RiotfileParser, VenvSpec};
use crate::runners::{CommandOutput, CommandRunner, Invocation, Shell, ShellRunner};
use crate::settings::RiotSettings;
use crate::utils::pep_dep;
use crate::venv::{VirtualEnv, WheelSource};

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Variables passed to commands even without `--pass-env`
pub const ALWAYS_PASS_ENV: &[&str] = &[
    "LANG",
    "LANGUAGE",
    "SSL_CERT_FILE",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "NO_PROXY",
    "PIP_INDEX_URL",
    "PATH",
];

/// How virtual environments are prepared
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Remove and rebuild venvs the first time they are used in this session
    pub recreate_venvs: bool,
    /// Do not install the project into the venvs
    pub skip_base_install: bool,
    /// Compile `<short_hash>.txt` again and rebuild the venvs from it
    pub recompile_requirements: bool,
}

/// Configuration for `run`
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub build: BuildOptions,
    /// Pass the whole parent environment to commands
    pub pass_env: bool,
    /// Skip instances whose interpreter is not installed instead of failing
    pub skip_missing: bool,
    /// Stop after the first failure
    pub exit_first: bool,
    /// Substituted for `{cmdargs}` in commands
    pub cmdargs: Vec<String>,
}

/// A loaded riotfile with everything needed to act on its instances
pub struct Session {
    instances: Vec<EnvironmentInstance>,
    settings: RiotSettings,
    wheel_path: Option<String>,
    runner: Arc<dyn CommandRunner>,
    shell: Shell,
    interpreters: InterpreterCache,
    /// Venvs already prepared during this session
    prepared: Mutex<HashSet<PathBuf>>,
    event_tx: Option<ProgressSender>,
}

impl Session {
    /// Create a session from a parsed venv tree
    pub fn new(root: &VenvSpec, settings: RiotSettings) -> Self {
        Self {
            instances: MatrixExpander::expand(root),
            settings,
            wheel_path: None,
            runner: Arc::new(ShellRunner::new()),
            shell: Shell::from_env(),
            interpreters: InterpreterCache::new(),
            prepared: Mutex::new(HashSet::new()),
            event_tx: None,
        }
    }

    /// Load a riotfile from disk
    pub fn load(path: &Path, settings: RiotSettings) -> RiotResult<Self> {
        let root = RiotfileParser::parse_file(path)?;
        Ok(Self::new(&root, settings))
    }

    /// Install the project from wheels found at this path or URL
    pub fn with_wheel_path(mut self, wheel_path: Option<String>) -> Self {
        self.wheel_path = wheel_path.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.shell = shell;
        self
    }

    /// Set progress event sender
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn settings(&self) -> &RiotSettings {
        &self.settings
    }

    /// All instances in declaration order
    pub fn instances(&self) -> &[EnvironmentInstance] {
        &self.instances
    }

    /// Instances selected by `filter`, in declaration order
    pub fn list(&self, filter: &InstanceFilter) -> Vec<&EnvironmentInstance> {
        filter.apply(&self.instances)
    }

    /// Distinct interpreters of the selected instances, in first-use order
    pub fn interpreters(&self, filter: &InstanceFilter) -> Vec<Interpreter> {
        let mut seen = HashSet::new();
        self.list(filter)
            .into_iter()
            .map(|instance| instance.interpreter().clone())
            .filter(|py| seen.insert(py.clone()))
            .collect()
    }

    pub async fn resolve(&self, py: &Interpreter) -> RiotResult<ResolvedInterpreter> {
        self.interpreters.resolve(py, self.runner.as_ref()).await
    }

    /// Build the base venv of every interpreter used by the selection.
    ///
    /// Interpreters missing on this host are skipped with a warning.
    pub async fn generate_base_venvs(
        &self,
        filter: &InstanceFilter,
        options: &BuildOptions,
    ) -> RiotResult<Vec<PathBuf>> {
        let mut generated = Vec::new();
        for py in self.interpreters(filter) {
            let resolved = match self.resolve(&py).await {
                Ok(resolved) => resolved,
                Err(RiotError::InterpreterNotFound(hint)) => {
                    warn!(%hint, "skipping missing interpreter");
                    self.event_tx.send_event(ExecutionEvent::warning(format!(
                        "Skipping missing interpreter {}",
                        hint
                    )));
                    continue;
                }
                Err(e) => return Err(e),
            };
            let venv = self.ensure_base_venv(&resolved, options).await?;
            generated.push(venv.path().to_path_buf());
        }
        Ok(generated)
    }

    /// Build and run every instance, recording one result per instance.
    ///
    /// Instances outside the selection are reported as skipped. Failures do
    /// not stop the run unless `exit_first` is set; an interrupt always does.
    pub async fn run(&self, filter: &InstanceFilter, options: &RunOptions) -> RunReport {
        let start = Instant::now();
        let total = self.instances.iter().filter(|i| filter.matches(i)).count();
        self.event_tx.send_event(ExecutionEvent::RunStarted { total });

        let mut results = Vec::with_capacity(self.instances.len());
        let mut index = 0;
        for instance in &self.instances {
            if !filter.matches(instance) {
                debug!(instance = %instance.summary(), "skipping instance outside the selection");
                results.push(InstanceResult::not_selected(
                    instance.display_name(),
                    instance.short_hash(),
                    instance.summary(),
                    "does not match the selection",
                ));
                continue;
            }

            index += 1;
            self.event_tx.send_event(ExecutionEvent::InstanceStarted {
                index,
                total,
                short_hash: instance.short_hash().to_string(),
                summary: instance.summary(),
            });

            let result = self.run_instance(instance, options).await;
            let outcome = result.outcome;
            match outcome {
                Outcome::Skipped => self.event_tx.send_event(ExecutionEvent::skipped(
                    instance.short_hash(),
                    result.message.clone().unwrap_or_default(),
                )),
                _ => self.event_tx.send_event(ExecutionEvent::InstanceCompleted {
                    short_hash: instance.short_hash().to_string(),
                    outcome,
                    duration: result.duration,
                    exit_code: result.exit_code,
                }),
            }
            results.push(result);

            if outcome == Outcome::Interrupted {
                warn!("interrupted, stopping the run");
                break;
            }
            if outcome == Outcome::Failed && options.exit_first {
                info!("stopping at the first failure");
                break;
            }
        }

        let report = RunReport {
            results,
            duration: start.elapsed(),
        };
        self.event_tx.send_event(ExecutionEvent::RunCompleted {
            passed: report.passed(),
            failed: report.failed(),
            skipped: report.skipped(),
            duration: report.duration,
        });
        report
    }

    async fn run_instance(&self, instance: &EnvironmentInstance, options: &RunOptions) -> InstanceResult {
        let start = Instant::now();
        let mut result = InstanceResult {
            name: instance.display_name().to_string(),
            short_hash: instance.short_hash().to_string(),
            summary: instance.summary(),
            outcome: Outcome::Failed,
            exit_code: None,
            duration: Duration::ZERO,
            warnings: false,
            message: None,
            selected: true,
        };

        match self.execute(instance, options).await {
            Ok(output) => {
                result.exit_code = output.exit_code;
                result.warnings = has_warnings(&output.combined());
                result.outcome = if output.interrupted {
                    Outcome::Interrupted
                } else if output.success() {
                    Outcome::Passed
                } else {
                    Outcome::Failed
                };
            }
            Err(e) if e.is_interrupted() => {
                warn!(instance = %instance.summary(), "interrupted while building");
                result.outcome = Outcome::Interrupted;
                result.message = Some(e.to_string());
            }
            Err(RiotError::InterpreterNotFound(hint)) if options.skip_missing => {
                info!(%hint, "skipping instance with missing interpreter");
                result.outcome = Outcome::Skipped;
                result.message = Some(format!("interpreter {} not found", hint));
            }
            Err(e) => {
                warn!(instance = %instance.summary(), error = %e, "instance failed");
                self.event_tx.send_event(ExecutionEvent::error(error_report(&e)));
                result.exit_code = e.exit_code();
                result.message = Some(e.to_string());
            }
        }

        result.duration = start.elapsed();
        result
    }

    async fn execute(&self, instance: &EnvironmentInstance, options: &RunOptions) -> RiotResult<CommandOutput> {
        let (py, venv) = self.prepare(instance, &options.build).await?;

        let command = instance.command_with_args(&options.cmdargs);
        let env = child_env(parent_env(options.pass_env), instance, &py, &venv);
        let invocation = self.shell.script(&command).clear_env().envs(env);

        info!(instance = %instance.short_hash(), %command, "running command");
        self.event_tx.send_event(ExecutionEvent::CommandStarted {
            short_hash: instance.short_hash().to_string(),
            command,
        });

        let tx = self.event_tx.clone();
        let hash = instance.short_hash().to_string();
        let output = self
            .runner
            .stream(
                &invocation,
                Box::new(move |line, is_error| {
                    tx.send_event(ExecutionEvent::output(hash.clone(), line, is_error))
                }),
            )
            .await;
        Ok(output)
    }

    /// Resolve the interpreter and build the venv `instance` runs in
    pub async fn prepare(
        &self,
        instance: &EnvironmentInstance,
        options: &BuildOptions,
    ) -> RiotResult<(ResolvedInterpreter, VirtualEnv)> {
        let py = self.resolve(instance.interpreter()).await?;
        let base = self.ensure_base_venv(&py, options).await?;
        if instance.ident().is_empty() {
            return Ok((py, base));
        }

        let venv = VirtualEnv::new(instance.venv_path(&py, &self.settings));
        if !self.claim(&venv).await {
            return Ok((py, venv));
        }

        let built = self.build_instance_venv(instance, &py, &venv, options).await;
        if built.is_err() {
            self.release(&venv).await;
        }
        built?;
        Ok((py, venv))
    }

    async fn build_instance_venv(
        &self,
        instance: &EnvironmentInstance,
        py: &ResolvedInterpreter,
        venv: &VirtualEnv,
        options: &BuildOptions,
    ) -> RiotResult<()> {
        let hash = instance.short_hash();
        let recreate = options.recreate_venvs || options.recompile_requirements;
        let created = self.create_venv(venv, py, recreate, hash).await?;
        if created && !options.skip_base_install && !instance.skip_dev_install() {
            self.install_project(venv, hash).await?;
        }

        let requirements = self.requirements_path(instance);
        if options.recompile_requirements {
            self.compile_requirements(instance, py).await?;
        }

        if requirements.is_file() {
            self.event_tx.send_event(ExecutionEvent::building(
                hash,
                BuildPhase::InstallingRequirements {
                    path: requirements.clone(),
                },
            ));
            venv.install_requirements(&requirements, self.runner.as_ref())
                .await
        } else {
            self.event_tx.send_event(ExecutionEvent::building(
                hash,
                BuildPhase::InstallingPackages {
                    pkgs: instance.full_pkg_str(),
                },
            ));
            venv.install_packages(instance.full_pkgs(), self.runner.as_ref())
                .await
        }
    }

    /// Mark a venv as prepared; false when it already was this session
    async fn claim(&self, venv: &VirtualEnv) -> bool {
        self.prepared.lock().await.insert(venv.path().to_path_buf())
    }

    async fn release(&self, venv: &VirtualEnv) {
        self.prepared.lock().await.remove(venv.path());
    }

    async fn ensure_base_venv(
        &self,
        py: &ResolvedInterpreter,
        options: &BuildOptions,
    ) -> RiotResult<VirtualEnv> {
        let venv = VirtualEnv::new(py.base_venv_path(&self.settings));
        if !self.claim(&venv).await {
            return Ok(venv);
        }

        let built = async {
            let created = self
                .create_venv(&venv, py, options.recreate_venvs, py.hint())
                .await?;
            if created && !options.skip_base_install {
                self.install_project(&venv, py.hint()).await?;
            }
            Ok::<_, RiotError>(())
        }
        .await;
        if built.is_err() {
            self.release(&venv).await;
        }
        built?;
        Ok(venv)
    }

    async fn create_venv(
        &self,
        venv: &VirtualEnv,
        py: &ResolvedInterpreter,
        recreate: bool,
        tag: &str,
    ) -> RiotResult<bool> {
        let path = venv.path().to_path_buf();
        let phase = if venv.exists() && !recreate {
            BuildPhase::ReusingVenv { path }
        } else {
            BuildPhase::CreatingVenv { path }
        };
        self.event_tx.send_event(ExecutionEvent::building(tag, phase));
        venv.create(py, recreate, self.runner.as_ref()).await
    }

    /// Install the project, from a wheel when a wheel path is configured
    async fn install_project(&self, venv: &VirtualEnv, tag: &str) -> RiotResult<()> {
        match &self.wheel_path {
            Some(location) => {
                self.event_tx.send_event(ExecutionEvent::building(
                    tag,
                    BuildPhase::InstallingWheel {
                        source: location.clone(),
                    },
                ));
                WheelSource::resolve(location.clone(), &self.settings)?
                    .install(venv, &self.settings.wheel_dir(), self.runner.as_ref())
                    .await
            }
            None => {
                self.event_tx
                    .send_event(ExecutionEvent::building(tag, BuildPhase::InstallingProject));
                venv.install_project(&self.settings.project_dir, self.runner.as_ref())
                    .await
                    .map(|_| ())
            }
        }
    }

    /// Find the single instance named `ident` or with short hash `ident`
    pub fn find(&self, ident: &str) -> RiotResult<&EnvironmentInstance> {
        let matches: Vec<&EnvironmentInstance> = self
            .instances
            .iter()
            .filter(|i| i.short_hash() == ident || i.name() == Some(ident))
            .collect();

        match matches.as_slice() {
            [] => Err(RiotError::UnknownInstance(ident.to_string())),
            [instance] => Ok(*instance),
            many => Err(RiotError::AmbiguousInstance {
                ident: ident.to_string(),
                candidates: many
                    .iter()
                    .map(|i| format!("{} ({})", i.short_hash(), i.summary()))
                    .collect(),
            }),
        }
    }

    /// Build the instance's venv and attach a shell (or `command`) to it
    pub async fn shell(
        &self,
        ident: &str,
        pass_env: bool,
        command: Option<&str>,
        options: &BuildOptions,
    ) -> RiotResult<CommandOutput> {
        let instance = self.find(ident)?;
        let (py, venv) = self.prepare(instance, options).await?;

        let env = child_env(parent_env(pass_env), instance, &py, &venv);
        let invocation = match command {
            Some(command) => self.shell.script(command),
            None => self.shell.interactive(),
        }
        .clear_env()
        .envs(env);

        info!(venv = ?venv.path(), "entering venv");
        Ok(self.runner.interactive(&invocation).await)
    }

    /// Pin the instance's packages with pip-tools.
    ///
    /// Writes `<short_hash>.in` and compiles it to `<short_hash>.txt` in the
    /// requirements directory; returns the compiled file.
    pub async fn requirements(&self, ident: &str) -> RiotResult<PathBuf> {
        let instance = self.find(ident)?;
        let py = self.resolve(instance.interpreter()).await?;
        self.compile_requirements(instance, &py).await
    }

    /// Compiled requirements file of `instance`, which may not exist yet
    pub fn requirements_path(&self, instance: &EnvironmentInstance) -> PathBuf {
        self.settings
            .requirements_dir()
            .join(format!("{}.txt", instance.short_hash()))
    }

    async fn compile_requirements(
        &self,
        instance: &EnvironmentInstance,
        py: &ResolvedInterpreter,
    ) -> RiotResult<PathBuf> {
        let options = BuildOptions {
            skip_base_install: true,
            ..BuildOptions::default()
        };
        let base = self.ensure_base_venv(py, &options).await?;

        let install_tools = base.pip("install").arg("pip-tools");
        let output = self.runner.output(&install_tools).await;
        if !output.success() {
            return Err(RiotError::from_output(
                "Failed to install pip-tools",
                &install_tools,
                &output,
            ));
        }

        let dir = self.settings.requirements_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let input = dir.join(format!("{}.in", instance.short_hash()));
        let compiled = self.requirements_path(instance);

        let mut content = instance
            .full_pkgs()
            .iter()
            .map(|(name, constraint)| pep_dep(name, constraint))
            .collect::<Vec<_>>()
            .join("\n");
        content.push('\n');
        tokio::fs::write(&input, content).await?;

        self.event_tx.send_event(ExecutionEvent::building(
            instance.short_hash(),
            BuildPhase::CompilingRequirements {
                path: compiled.clone(),
            },
        ));
        let compile = Invocation::new(base.python().to_string_lossy())
            .args(["-m", "piptools", "compile", "--no-annotate", "-o"])
            .arg(compiled.to_string_lossy())
            .arg(input.to_string_lossy())
            .envs(base.run_env(std::env::var("PATH").ok().as_deref()));
        let output = self.runner.output(&compile).await;
        if !output.success() {
            return Err(RiotError::from_output(
                format!("Failed to compile {}", input.display()),
                &compile,
                &output,
            ));
        }

        info!(path = ?compiled, "requirements compiled");
        Ok(compiled)
    }
}

/// The parent environment a command starts from
fn parent_env(pass_env: bool) -> BTreeMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| pass_env || ALWAYS_PASS_ENV.contains(&key.as_str()))
        .collect()
}

/// Environment of an instance's command.
///
/// Layered in order: the parent environment, the instance's own variables,
/// the venv activation, then the `RIOT*` identification variables.
pub fn child_env(
    parent: BTreeMap<String, String>,
    instance: &EnvironmentInstance,
    py: &ResolvedInterpreter,
    venv: &VirtualEnv,
) -> BTreeMap<String, String> {
    let mut env = parent;
    env.extend(instance.env().iter().cloned());
    let activation = venv.run_env(env.get("PATH").map(String::as_str));
    env.extend(activation);
    env.extend(instance.riot_env(py));
    env
}

/// Error text including captured command output, when there is any
fn error_report(err: &RiotError) -> String {
    match err {
        RiotError::CommandFailed { output, .. } if !output.trim().is_empty() => {
            format!("{}\n{}", err, output.trim_end())
        }
        _ => err.to_string(),
    }
}
