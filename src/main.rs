use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod config;
mod error;
mod guard;
mod parser;
mod request;
mod runner;
mod server;
mod worker;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise only show info/debug with --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("cropbridge=debug,tower_http=debug")
        } else {
            EnvFilter::new("cropbridge=warn")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve(args) => cli::serve::execute(args).await,
        Commands::Predict(args) => cli::predict::execute(args).await,
        Commands::Parse(args) => cli::parse::execute(args),
        Commands::Check(args) => cli::check::execute(args).await,
        Commands::Schema => cli::schema::execute(),
    }
}
