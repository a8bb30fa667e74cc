// Logging
// tracing subscriber setup for the CLI

use tracing_subscriber::{prelude::*, EnvFilter};

/// Initialize tracing on stderr.
///
/// `RUST_LOG` wins; otherwise `warn`, raised to `info` by `--verbose` and
/// `debug` by `--debug`.
pub fn init(verbose: bool, debug: bool) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
