mod api;
mod cli;
mod config;
mod error;
mod import;
mod query;
mod server;
mod store;
mod store_manager;

use clap::Parser;
use crate::cli::Cli;
use crate::error::StoreError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // One-shot commands stay quiet unless RUST_LOG says otherwise
    let default_filter = if cli.command.is_long_running() {
        "whatport=info"
    } else {
        "whatport=warn"
    };

    // Initialize tracing on stderr so stdout only carries results
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter))
        )
        .init();

    if let Err(e) = cli::run(cli).await {
        eprintln!("Error: {:#}", e);
        // Distinguish "nothing imported yet" from real failures
        let missing = e
            .downcast_ref::<StoreError>()
            .is_some_and(StoreError::is_missing);
        std::process::exit(if missing { 2 } else { 1 });
    }
}
