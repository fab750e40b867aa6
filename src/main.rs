//! Quorum CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quorum::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init(args) => quorum::cli::commands::init::execute(args, cli.json).await,
        Commands::Definition(args) => {
            quorum::cli::commands::definition::execute(args, cli.json).await
        }
        Commands::Directory(args) => quorum::cli::commands::directory::execute(args, cli.json).await,
        Commands::Submit(args) => quorum::cli::commands::submit::execute(args, cli.json).await,
        Commands::Decide(args) => quorum::cli::commands::decide::execute(args, cli.json).await,
        Commands::Cancel(args) => quorum::cli::commands::cancel::execute(args, cli.json).await,
        Commands::Instance(args) => quorum::cli::commands::instance::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        quorum::cli::handle_error(err, cli.json);
    }
}
