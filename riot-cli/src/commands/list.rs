use super::{load_session, GlobalArgs, SelectionArgs, EXIT_NO_RIOTFILE};

use clap::Args;
use color_eyre::Result;

/// List the venv instances of the riotfile
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Print the distinct Python hints instead of the instances
    #[arg(short = 'i', long = "interpreters")]
    pub interpreters: bool,

    /// Print only the short hash of each instance
    #[arg(long)]
    pub hash_only: bool,
}

pub fn execute(global: &GlobalArgs, args: ListArgs) -> Result<i32> {
    let Some(session) = load_session(global)? else {
        return Ok(EXIT_NO_RIOTFILE);
    };
    let filter = args.selection.filter()?;

    if args.interpreters {
        for py in session.interpreters(&filter) {
            println!("{}", py);
        }
        return Ok(0);
    }

    for instance in session.list(&filter) {
        if args.hash_only {
            println!("{}", instance.short_hash());
        } else {
            println!("{}  {}", instance.short_hash(), instance.summary());
        }
    }
    Ok(0)
}
