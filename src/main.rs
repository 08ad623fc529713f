//! `textplay` - sequenced terminal text playback

use clap::Parser;

use textplay::cli::args::Cli;
use textplay::cli::commands;
use textplay::cli::shutdown::{self, Shutdown};
use textplay::observability::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.log_format, cli.verbose, cli.color);
    }

    let shutdown = Shutdown::new();
    let listener = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = shutdown::listen(listener).await {
            tracing::warn!(error = %e, "signal handlers unavailable");
        }
    });

    match commands::dispatch(cli, &shutdown).await {
        Ok(()) => std::process::exit(shutdown.exit_code()),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
