//! CLI entry point.

use clap::Parser;
use tokbridge_cli::{Cli, handlers};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match handlers::dispatch(cli.command).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{e:#}");
            1
        }
    };

    // A pending stdin read sits on a blocking thread that runtime shutdown
    // would wait for.
    std::process::exit(code);
}
