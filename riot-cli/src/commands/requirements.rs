use crate::output;

use super::{load_session, GlobalArgs, EXIT_NO_RIOTFILE};

use clap::Args;
use color_eyre::Result;

/// Compile pinned requirements for a venv instance with pip-tools
#[derive(Args, Debug)]
pub struct RequirementsArgs {
    /// Instance name or short hash
    pub ident: String,
}

pub async fn execute(global: &GlobalArgs, args: RequirementsArgs) -> Result<i32> {
    let Some(session) = load_session(global)? else {
        return Ok(EXIT_NO_RIOTFILE);
    };

    let instance = session.find(&args.ident)?;
    output::status("Compiling", &instance.summary());

    let compiled = session.requirements(&args.ident).await?;
    output::success(&compiled.display().to_string());
    Ok(0)
}
