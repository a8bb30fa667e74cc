// Riot CLI
// Build Python virtualenv matrices from a riotfile and run commands in them

mod commands;
mod logging;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;

use riot_service::DEFAULT_RIOTFILE;

/// Build Python virtual environments from a riotfile and run commands in them
#[derive(Parser, Debug)]
#[command(name = "riot", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Riotfile to load
    #[arg(short = 'f', long = "file", global = true, default_value = DEFAULT_RIOTFILE)]
    file: PathBuf,

    /// Show info logs
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Show debug logs
    #[arg(short, long, global = true)]
    debug: bool,

    /// Plain output without colours, for pipes and CI logs
    #[arg(short = 'P', long, global = true)]
    pipe: bool,

    /// Install the project from wheels found at this path or URL
    #[arg(long, global = true, env = "RIOT_WHEEL_PATH", value_name = "PATH_OR_URL")]
    wheel_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the venv instances of the riotfile
    List(commands::list::ListArgs),

    /// Build the base venvs without running anything
    Generate(commands::generate::GenerateArgs),

    /// Build venvs and run their commands
    Run(commands::run::RunArgs),

    /// Open a shell (or run a command) inside a venv instance
    Shell(commands::shell::ShellArgs),

    /// Compile pinned requirements for a venv instance
    Requirements(commands::requirements::RequirementsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(cli.verbose, cli.debug);
    output::set_plain(cli.pipe);

    let global = commands::GlobalArgs {
        file: cli.file,
        wheel_path: cli.wheel_path,
    };

    let code = match cli.command {
        Commands::List(args) => commands::list::execute(&global, args)?,
        Commands::Generate(args) => commands::generate::execute(&global, args).await?,
        Commands::Run(args) => commands::run::execute(&global, args).await?,
        Commands::Shell(args) => commands::shell::execute(&global, args).await?,
        Commands::Requirements(args) => commands::requirements::execute(&global, args).await?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
