//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::LoudnessMeter;
use crate::chain::{ChainSpecBuilder, GenreEqCurve, TierId};
use crate::config::PreviewConfig;
use crate::engine::{export_wav, import_wav, ExportFormat};
use crate::error::Result;
use crate::preview::{PreviewOrchestrator, PreviewSet};

/// Name of the report written next to the rendered tiers
pub const REPORT_FILE: &str = "report.json";

fn load_curve(genre: Option<&Path>) -> Result<GenreEqCurve> {
    match genre {
        Some(path) => GenreEqCurve::from_file(path),
        None => Ok(GenreEqCurve::neutral()),
    }
}

/// Measure a WAV file and print its statistics.
pub fn analyze(input: &Path) -> Result<()> {
    info!("Analyzing: {}", input.display());

    let buffer = import_wav(input)?;
    let stats = LoudnessMeter::default().measure(&buffer);
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

/// Print a tier's chain spec.
pub fn chain(tier: TierId, stereo: bool, genre: Option<&Path>) -> Result<()> {
    let curve = load_curve(genre)?;
    let channels = if stereo { 2 } else { 1 };
    let spec = ChainSpecBuilder::new(curve).build(tier, channels);
    println!("{}", serde_json::to_string_pretty(&spec)?);

    Ok(())
}

/// Files written by a render
#[derive(Debug, Clone, Serialize)]
pub struct RenderOutput {
    pub tier_files: Vec<PathBuf>,
    pub report: PathBuf,
}

/// Render every tier and write `<tier>.wav` plus a JSON report.
pub async fn render(
    input: &Path,
    out_dir: &Path,
    config: Option<&Path>,
    genre: Option<&Path>,
) -> Result<RenderOutput> {
    info!("Rendering previews for: {}", input.display());

    let config = match config {
        Some(path) => PreviewConfig::from_file(path)?,
        None => PreviewConfig::default(),
    };
    let curve = load_curve(genre)?;
    let source = Arc::new(import_wav(input)?);

    let mut orchestrator = PreviewOrchestrator::new(config)?.with_genre_curve(curve);
    let set = orchestrator.present(source).await?;

    write_outputs(&set, out_dir)
}

fn write_outputs(set: &PreviewSet, out_dir: &Path) -> Result<RenderOutput> {
    std::fs::create_dir_all(out_dir)?;

    let mut tier_files = Vec::new();
    for preview in set.previews.values() {
        match (&preview.buffer, &preview.error) {
            (Some(buffer), _) => {
                let path = out_dir.join(format!("{}.wav", preview.tier));
                export_wav(buffer, &path, ExportFormat::default())?;
                println!("{}: {}", preview.tier, path.display());
                tier_files.push(path);
            }
            (None, Some(reason)) => {
                warn!("{} failed: {}", preview.tier, reason);
                println!("{}: failed ({})", preview.tier, reason);
            }
            (None, None) => {}
        }
    }

    let report = out_dir.join(REPORT_FILE);
    std::fs::write(&report, serde_json::to_string_pretty(set)?)?;
    println!("Report: {}", report.display());

    Ok(RenderOutput { tier_files, report })
}
