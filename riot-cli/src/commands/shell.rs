use crate::output;

use super::{load_session, GlobalArgs, EXIT_NO_RIOTFILE};

use clap::Args;
use color_eyre::Result;

use riot_service::BuildOptions;

/// Open a shell (or run a command) inside a venv instance
#[derive(Args, Debug)]
pub struct ShellArgs {
    /// Instance name or short hash
    pub ident: String,

    /// Pass the whole environment to the shell
    #[arg(long)]
    pub pass_env: bool,

    /// Run this command instead of an interactive shell
    #[arg(short = 'c', long, value_name = "COMMAND")]
    pub command: Option<String>,

    /// Remove and rebuild the venv first
    #[arg(short = 'r', long)]
    pub recreate_venvs: bool,

    /// Do not install the project into the venv
    #[arg(long)]
    pub skip_base_install: bool,
}

pub async fn execute(global: &GlobalArgs, args: ShellArgs) -> Result<i32> {
    let Some(session) = load_session(global)? else {
        return Ok(EXIT_NO_RIOTFILE);
    };
    let options = BuildOptions {
        recreate_venvs: args.recreate_venvs,
        skip_base_install: args.skip_base_install,
        ..BuildOptions::default()
    };

    let instance = session.find(&args.ident)?;
    output::status("Preparing", &instance.summary());

    let result = session
        .shell(&args.ident, args.pass_env, args.command.as_deref(), &options)
        .await?;

    if result.interrupted {
        output::warning("interrupted");
    }
    Ok(result.exit_code.unwrap_or(1))
}
