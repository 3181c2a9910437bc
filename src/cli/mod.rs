//! CLI Module
//!
//! Command-line interface for rendering and inspecting tier previews.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::chain::TierId;

/// Tier Preview - compare mastering tiers on the same recording
#[derive(Parser, Debug)]
#[command(name = "tierpreview-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print loudness statistics of a WAV file as JSON
    #[command(name = "analyze")]
    Analyze {
        /// Input WAV file
        input: PathBuf,
    },

    /// Print the processing chain of a tier as JSON
    #[command(name = "chain")]
    Chain {
        /// Tier to describe (basic, advanced, premium)
        #[arg(short, long)]
        tier: TierId,

        /// Describe the chain for stereo input
        #[arg(short, long)]
        stereo: bool,

        /// Genre EQ curve (JSON)
        #[arg(short, long)]
        genre: Option<PathBuf>,
    },

    /// Render every tier preview of a WAV file
    #[command(name = "render")]
    Render {
        /// Input WAV file
        input: PathBuf,

        /// Directory for the rendered tiers and the report
        #[arg(short, long, default_value = "previews")]
        out_dir: PathBuf,

        /// Preview configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Genre EQ curve (JSON)
        #[arg(short, long)]
        genre: Option<PathBuf>,
    },
}
