// Recording runner for tests
// Records invocations and answers with scripted outputs

use super::{CommandOutput, CommandRunner, Invocation, OutputCallback};

use std::sync::Mutex;

type Responder = Box<dyn Fn(&Invocation) -> Option<CommandOutput> + Send + Sync>;

/// A `CommandRunner` that never spawns anything
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    responders: Vec<Responder>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responders: Vec::new(),
        }
    }

    /// Answer invocations whose command line contains `needle`
    pub fn respond(mut self, needle: &str, output: CommandOutput) -> Self {
        let needle = needle.to_string();
        self.responders.push(Box::new(move |invocation| {
            invocation.display().contains(&needle).then(|| output.clone())
        }));
        self
    }

    /// Answer with a custom function, first match wins
    pub fn respond_with<F>(mut self, responder: F) -> Self
    where
        F: Fn(&Invocation) -> Option<CommandOutput> + Send + Sync + 'static,
    {
        self.responders.push(Box::new(responder));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Command lines of all recorded invocations
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::display).collect()
    }

    fn answer(&self, invocation: &Invocation) -> CommandOutput {
        self.calls.lock().unwrap().push(invocation.clone());
        self.responders
            .iter()
            .find_map(|responder| responder(invocation))
            .unwrap_or_else(|| ok(""))
    }
}

/// A successful output with the given stdout
pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        stdout: stdout.to_string(),
        exit_code: Some(0),
        ..Default::default()
    }
}

/// A failed output with the given exit code and stderr
pub fn failed(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        stderr: stderr.to_string(),
        exit_code: Some(code),
        ..Default::default()
    }
}

#[async_trait::async_trait]
impl CommandRunner for RecordingRunner {
    async fn output(&self, invocation: &Invocation) -> CommandOutput {
        self.answer(invocation)
    }

    async fn stream(&self, invocation: &Invocation, on_output: OutputCallback) -> CommandOutput {
        let output = self.answer(invocation);
        for line in output.stdout.lines() {
            on_output(line, false);
        }
        for line in output.stderr.lines() {
            on_output(line, true);
        }
        output
    }

    async fn interactive(&self, invocation: &Invocation) -> CommandOutput {
        let mut output = self.answer(invocation);
        output.stdout.clear();
        output.stderr.clear();
        output
    }
}
