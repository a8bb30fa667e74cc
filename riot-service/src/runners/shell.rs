// Shell Runner
// Spawns processes with tokio, streaming or capturing their output

use super::{CommandOutput, CommandRunner, Invocation, OutputCallback};

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Grace period for a child to exit on its own after Ctrl-C
const INTERRUPT_GRACE: Duration = Duration::from_secs(10);

/// Shell used to run riotfile commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    program: String,
}

impl Shell {
    /// `$SHELL`, falling back to bash
    pub fn from_env() -> Self {
        let program = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "/bin/bash".to_string());
        Self { program }
    }

    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Invocation running `script` through this shell
    pub fn script(&self, script: &str) -> Invocation {
        Invocation::new(self.program.clone()).args(["-c", script])
    }

    /// Invocation starting this shell interactively
    pub fn interactive(&self) -> Invocation {
        Invocation::new(self.program.clone()).arg("-i")
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Process runner backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if invocation.clear_env {
            cmd.env_clear();
        }
        cmd.envs(&invocation.env);
        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn_failure(invocation: &Invocation, err: std::io::Error) -> CommandOutput {
        CommandOutput {
            stderr: format!("Failed to spawn process '{}': {}", invocation.program, err),
            ..Default::default()
        }
    }

    async fn run_piped(
        &self,
        invocation: &Invocation,
        on_output: Option<OutputCallback>,
    ) -> CommandOutput {
        debug!(command = %invocation.display(), "spawning");

        let mut cmd = Self::command(invocation);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return Self::spawn_failure(invocation, e),
        };

        let on_output = on_output.map(Arc::new);
        let stdout_handle = child
            .stdout
            .take()
            .map(|out| tokio::spawn(collect_lines(out, on_output.clone(), false)));
        let stderr_handle = child
            .stderr
            .take()
            .map(|err| tokio::spawn(collect_lines(err, on_output, true)));

        let (exit_code, interrupted) = wait_interruptible(&mut child).await;

        let stdout = match stdout_handle {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        let stderr = match stderr_handle {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        CommandOutput {
            stdout,
            stderr,
            exit_code,
            interrupted,
        }
    }
}

/// Read a stream line by line, forwarding each line and collecting them all
async fn collect_lines<R>(
    reader: R,
    on_output: Option<Arc<OutputCallback>>,
    is_error: bool,
) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut output = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(callback) = &on_output {
            callback(&line, is_error);
        }
        if !output.is_empty() {
            output.push('\n');
        }
        output.push_str(&line);
    }
    output
}

/// Wait for the child, noticing Ctrl-C.
///
/// The terminal delivers SIGINT to the whole foreground process group, so the
/// child sees the interrupt itself. It gets a grace period to exit before it
/// is killed.
async fn wait_interruptible(child: &mut Child) -> (Option<i32>, bool) {
    tokio::select! {
        status = child.wait() => (status.ok().and_then(|s| s.code()), false),
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, waiting for the running command to exit");
            let status = match tokio::time::timeout(INTERRUPT_GRACE, child.wait()).await {
                Ok(status) => status.ok(),
                Err(_) => {
                    let _ = child.kill().await;
                    None
                }
            };
            (status.and_then(|s| s.code()), true)
        }
    }
}

#[async_trait::async_trait]
impl CommandRunner for ShellRunner {
    async fn output(&self, invocation: &Invocation) -> CommandOutput {
        self.run_piped(invocation, None).await
    }

    async fn stream(&self, invocation: &Invocation, on_output: OutputCallback) -> CommandOutput {
        self.run_piped(invocation, Some(on_output)).await
    }

    async fn interactive(&self, invocation: &Invocation) -> CommandOutput {
        debug!(command = %invocation.display(), "spawning attached to the terminal");

        let mut cmd = Self::command(invocation);
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return Self::spawn_failure(invocation, e),
        };

        // Ctrl-C belongs to the interactive program, keep riot alive meanwhile
        let guard = tokio::spawn(async {
            while tokio::signal::ctrl_c().await.is_ok() {}
        });
        let status = child.wait().await;
        guard.abort();

        CommandOutput {
            exit_code: status.ok().and_then(|s| s.code()),
            ..Default::default()
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use std::sync::Mutex;

    fn sh(script: &str) -> Invocation {
        Shell::new("sh").script(script)
    }

    #[tokio::test]
    async fn test_output_echo() {
        let output = ShellRunner::new().output(&sh("echo hello")).await;

        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout, "hello");
        assert!(output.stderr.is_empty());
        assert!(output.success());
    }

    #[tokio::test]
    async fn test_output_with_env() {
        let invocation = sh("echo $MY_VAR").env("MY_VAR", "test_value");
        let output = ShellRunner::new().output(&invocation).await;

        assert_eq!(output.stdout, "test_value");
    }

    #[tokio::test]
    async fn test_cleared_env() {
        std::env::set_var("RIOT_SHELL_TEST_LEAK", "leaked");
        let invocation = Invocation::new("/usr/bin/env").clear_env().env("ONLY", "this");
        let output = ShellRunner::new().output(&invocation).await;

        assert!(output.stdout.contains("ONLY=this"));
        assert!(!output.stdout.contains("RIOT_SHELL_TEST_LEAK"));
    }

    #[tokio::test]
    async fn test_exit_code() {
        let output = ShellRunner::new().output(&sh("exit 42")).await;

        assert_eq!(output.exit_code, Some(42));
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_stream_forwards_lines() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let output = ShellRunner::new()
            .stream(
                &sh("echo one; echo two >&2; echo three"),
                Box::new(move |line, is_error| {
                    sink.lock().unwrap().push((line.to_string(), is_error));
                }),
            )
            .await;

        assert_eq!(output.stdout, "one\nthree");
        assert_eq!(output.stderr, "two");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.contains(&("two".to_string(), true)));
        assert!(seen.contains(&("one".to_string(), false)));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let output = ShellRunner::new()
            .output(&Invocation::new("/nonexistent/riot-test-binary"))
            .await;

        assert_eq!(output.exit_code, None);
        assert!(output.stderr.contains("Failed to spawn process"));
    }

    #[tokio::test]
    async fn test_working_dir() {
        let temp = tempfile::tempdir().unwrap();
        let output = ShellRunner::new()
            .output(&sh("pwd").working_dir(temp.path()))
            .await;

        let expected = temp.path().canonicalize().unwrap();
        let actual = std::path::Path::new(&output.stdout).canonicalize().unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_shell_script_invocation() {
        let invocation = Shell::new("/bin/zsh").script("pytest -x");
        assert_eq!(invocation.program, "/bin/zsh");
        assert_eq!(invocation.args, vec!["-c", "pytest -x"]);
    }
}
