use crate::output;

use super::{load_session, GlobalArgs, SelectionArgs, EXIT_NO_RIOTFILE};

use clap::Args;
use color_eyre::Result;

use riot_service::execution::events::LogLevel;
use riot_service::{
    progress_channel, BuildOptions, BuildPhase, ExecutionEvent, Outcome, RunOptions, RunReport,
};

/// Build venvs and run their commands
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Remove and rebuild existing venvs
    #[arg(short = 'r', long)]
    pub recreate_venvs: bool,

    /// Do not install the project into the venvs
    #[arg(long)]
    pub skip_base_install: bool,

    /// Compile the requirements files again and rebuild the venvs from them
    #[arg(short = 'c', long)]
    pub recompile_requirements: bool,

    /// Pass the whole environment to the commands
    #[arg(long)]
    pub pass_env: bool,

    /// Skip instances whose Python is not installed instead of failing them
    #[arg(long)]
    pub skip_missing: bool,

    /// Stop after the first failure
    #[arg(short = 'x', long = "exitfirst")]
    pub exit_first: bool,

    /// Extra arguments substituted for {cmdargs}
    #[arg(last = true, value_name = "CMDARGS")]
    pub cmdargs: Vec<String>,
}

pub async fn execute(global: &GlobalArgs, args: RunArgs) -> Result<i32> {
    let Some(session) = load_session(global)? else {
        return Ok(EXIT_NO_RIOTFILE);
    };
    let filter = args.selection.filter()?;
    let options = RunOptions {
        build: BuildOptions {
            recreate_venvs: args.recreate_venvs,
            skip_base_install: args.skip_base_install,
            recompile_requirements: args.recompile_requirements,
        },
        pass_env: args.pass_env,
        skip_missing: args.skip_missing,
        exit_first: args.exit_first,
        cmdargs: args.cmdargs,
    };

    // Spawn the run in background, render events in the foreground
    let (tx, mut rx) = progress_channel();
    let session = session.with_progress(tx);
    let run_handle = tokio::spawn(async move { session.run(&filter, &options).await });

    while let Some(event) = rx.recv().await {
        render(&event);
    }

    let report = run_handle.await?;
    print_summary(&report);
    Ok(report.exit_code())
}

fn render(event: &ExecutionEvent) {
    match event {
        ExecutionEvent::RunStarted { total } => {
            output::header(&format!("Running {} venv instance(s)", total));
        }

        ExecutionEvent::InstanceStarted {
            index,
            total,
            short_hash,
            summary,
        } => {
            eprintln!();
            output::status(
                "Running",
                &format!("[{}/{}] {} {}", index, total, short_hash, summary),
            );
        }

        ExecutionEvent::Building { phase, .. } => match phase {
            BuildPhase::CreatingVenv { path } => {
                output::dim(&format!("    creating venv {}", path.display()))
            }
            BuildPhase::ReusingVenv { path } => {
                output::dim(&format!("    reusing venv {}", path.display()))
            }
            BuildPhase::InstallingProject => output::dim("    installing project (editable)"),
            BuildPhase::InstallingWheel { source } => {
                output::dim(&format!("    installing project wheel from {}", source))
            }
            BuildPhase::InstallingPackages { pkgs } => {
                output::dim(&format!("    installing {}", pkgs))
            }
            BuildPhase::CompilingRequirements { path } => {
                output::dim(&format!("    compiling {}", path.display()))
            }
            BuildPhase::InstallingRequirements { path } => {
                output::dim(&format!("    installing -r {}", path.display()))
            }
        },

        ExecutionEvent::CommandStarted { command, .. } => {
            output::dim(&format!("    $ {}", command));
        }

        ExecutionEvent::InstanceOutput { line, is_error, .. } => {
            if *is_error {
                output::command_error(line);
            } else {
                output::command_output(line);
            }
        }

        ExecutionEvent::InstanceCompleted {
            short_hash,
            outcome,
            duration,
            exit_code,
        } => {
            let exit_info = match exit_code {
                Some(code) if *code != 0 => format!(" (exit code: {})", code),
                _ => String::new(),
            };
            let message = format!(
                "{} {} ({:.2}s){}",
                short_hash,
                outcome,
                duration.as_secs_f64(),
                exit_info
            );
            match outcome {
                Outcome::Passed => output::success(&message),
                Outcome::Interrupted => output::warning(&message),
                _ => output::failure(&message),
            }
        }

        ExecutionEvent::InstanceSkipped { short_hash, reason } => {
            output::warning(&format!("{} skipped: {}", short_hash, reason));
        }

        ExecutionEvent::Log { level, message } => match level {
            LogLevel::Error => output::error(message),
            LogLevel::Warning => output::warning(message),
            LogLevel::Info => output::info(message),
        },

        ExecutionEvent::RunCompleted { .. } => {}
    }
}

fn print_summary(report: &RunReport) {
    eprintln!();
    output::header("Summary");

    for result in report.selected() {
        let line = format!("{} {}", result.short_hash, result.summary);
        match result.outcome {
            Outcome::Passed if result.warnings => output::warning(&format!("{} (warnings)", line)),
            Outcome::Passed => output::success(&line),
            Outcome::Skipped => output::dim(&format!(
                "  - {} ({})",
                line,
                result.message.as_deref().unwrap_or("skipped")
            )),
            Outcome::Failed | Outcome::Interrupted => output::failure(&line),
        }
    }

    let mut counts = format!(
        "{} passed, {} failed, {} skipped",
        report.passed(),
        report.failed(),
        report.skipped()
    );
    if report.warned() > 0 {
        counts.push_str(&format!(", {} with warnings", report.warned()));
    }
    if report.interrupted() {
        counts.push_str(", interrupted");
    }
    counts.push_str(&format!(" in {:.2}s", report.duration.as_secs_f64()));

    if report.success() {
        output::success(&counts);
    } else {
        output::failure(&counts);
    }
}
