use crate::output;

use super::{load_session, GlobalArgs, SelectionArgs, EXIT_NO_RIOTFILE};

use clap::Args;
use color_eyre::Result;

use riot_service::BuildOptions;

/// Build the base venvs without running anything
#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Remove and rebuild existing venvs
    #[arg(short = 'r', long)]
    pub recreate_venvs: bool,

    /// Do not install the project into the base venvs
    #[arg(long)]
    pub skip_base_install: bool,
}

pub async fn execute(global: &GlobalArgs, args: GenerateArgs) -> Result<i32> {
    let Some(session) = load_session(global)? else {
        return Ok(EXIT_NO_RIOTFILE);
    };
    let filter = args.selection.filter()?;
    let options = BuildOptions {
        recreate_venvs: args.recreate_venvs,
        skip_base_install: args.skip_base_install,
        ..BuildOptions::default()
    };

    output::status("Generating", "base virtual environments");
    let venvs = session.generate_base_venvs(&filter, &options).await?;
    for venv in &venvs {
        output::success(&venv.display().to_string());
    }
    if venvs.is_empty() {
        output::warning("no base venv was generated");
    }
    Ok(0)
}
