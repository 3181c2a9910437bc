//! Tier Preview CLI
//!
//! Command-line interface for rendering and inspecting tier previews.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tierpreview::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Tier Preview v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Analyze { input } => commands::analyze(&input)
            .with_context(|| format!("analyzing {}", input.display()))?,
        Commands::Chain {
            tier,
            stereo,
            genre,
        } => commands::chain(tier, stereo, genre.as_deref())?,
        Commands::Render {
            input,
            out_dir,
            config,
            genre,
        } => {
            commands::render(&input, &out_dir, config.as_deref(), genre.as_deref())
                .await
                .with_context(|| format!("rendering {}", input.display()))?;
        }
    }

    Ok(())
}
