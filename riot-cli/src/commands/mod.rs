// CLI commands
// Shared arguments and riotfile loading for the subcommands

pub mod generate;
pub mod list;
pub mod requirements;
pub mod run;
pub mod shell;

use crate::output;

use std::path::PathBuf;

use clap::Args;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use tracing::debug;

use riot_service::{InstanceFilter, RiotSettings, RiotfileParser, Session, MATCH_ALL};

/// Exit code when the riotfile does not exist
pub const EXIT_NO_RIOTFILE: i32 = 2;

/// Options shared by every subcommand
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub file: PathBuf,
    pub wheel_path: Option<String>,
}

/// Load the riotfile into a session.
///
/// Returns None after reporting the problem when the file does not exist.
pub fn load_session(global: &GlobalArgs) -> Result<Option<Session>> {
    let Some(path) = RiotfileParser::discover(&global.file) else {
        output::error(&format!("riotfile not found: {}", global.file.display()));
        return Ok(None);
    };

    debug!(path = ?path, "loading riotfile");
    let settings = RiotSettings::from_env().with_project_dir(std::env::current_dir()?);
    let session = Session::load(&path, settings)
        .wrap_err_with(|| format!("Failed to load {}", path.display()))?;
    Ok(Some(session.with_wheel_path(global.wheel_path.clone())))
}

/// Which instances a command acts on
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Regex matched at the start of instance names, or a short hash
    #[arg(value_name = "PATTERN", env = "RIOT_PATTERN")]
    pub pattern: Option<String>,

    /// Same as PATTERN, takes precedence over it
    #[arg(short = 's', long = "select", value_name = "PATTERN")]
    pub select: Option<String>,

    /// Regex searched in the venv identifier
    #[arg(long, value_name = "REGEX")]
    pub venv_pattern: Option<String>,

    /// Only instances for this Python hint (can be repeated)
    #[arg(short = 'p', long = "python", value_name = "VERSION")]
    pub pythons: Vec<String>,
}

impl SelectionArgs {
    pub fn filter(&self) -> Result<InstanceFilter> {
        let pattern = self
            .select
            .as_deref()
            .or(self.pattern.as_deref())
            .unwrap_or(MATCH_ALL);

        let filter = InstanceFilter::new(pattern)?
            .with_venv_pattern(self.venv_pattern.as_deref())?
            .with_pythons(self.pythons.iter().cloned());
        Ok(filter)
    }
}
