mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Results go to stdout, logs to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uitree=info,uitree_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Read {
            source,
            scan,
            output,
        } => {
            commands::read::handle(&source, &scan, output.as_deref())?;
        }

        Commands::Candidates { source, scan, json } => {
            commands::candidates::handle(&source, &scan, json)?;
        }

        Commands::Modules { pid, process_name } => {
            commands::modules::handle(pid, process_name.as_deref())?;
        }

        Commands::Layout { layout } => {
            commands::layout::handle(layout.as_deref())?;
        }
    }

    Ok(())
}
