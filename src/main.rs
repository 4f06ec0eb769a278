//! Scriptvault CLI: central script store with fleet-wide dispatch.

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "scriptvault",
    version,
    about = "Central script store: run shell or rhai scripts on the master and its agents"
)]
struct Cli {
    #[command(subcommand)]
    command: scriptvault::cli::Commands,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SCRIPTVAULT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = scriptvault::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
