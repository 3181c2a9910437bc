//! CLI adapter tests: configuration files, WAV round trips and the render
//! command writing tier files plus a report.

use std::path::Path;

use tempfile::tempdir;

use tierpreview::cli::commands::{self, REPORT_FILE};
use tierpreview::engine::{export_wav, generate_test_tone, import_wav, ChannelLayout, ExportFormat};
use tierpreview::{GenreEqCurve, PreviewConfig, PreviewError, TierId};

fn write_tone(path: &Path, seconds: f32, layout: ChannelLayout) {
    let tone = generate_test_tone(1000.0, 0.2, seconds, 48000, layout);
    export_wav(&tone, path, ExportFormat::pcm16()).unwrap();
}

#[test]
fn test_config_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preview.json");
    std::fs::write(
        &path,
        r#"{
            "segment": { "window_secs": 8.0, "lead_in_secs": 1.0 },
            "playback": { "crossfade_secs": 0.5 },
            "reference_tier": "premium",
            "tiers": ["basic", "premium"]
        }"#,
    )
    .unwrap();

    let config = PreviewConfig::from_file(&path).unwrap();
    assert_eq!(config.segment.window_secs, 8.0);
    assert_eq!(config.segment.hop_secs, 1.0);
    assert_eq!(config.playback.crossfade_secs, 0.5);
    assert_eq!(config.reference_tier, TierId::Premium);
    assert_eq!(config.tiers, vec![TierId::Basic, TierId::Premium]);
}

#[test]
fn test_invalid_config_file_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "tiers": [] }"#).unwrap();

    assert!(matches!(
        PreviewConfig::from_file(&path),
        Err(PreviewError::InvalidConfig { .. })
    ));
    assert!(matches!(
        PreviewConfig::from_file(&dir.path().join("missing.json")),
        Err(PreviewError::FileNotFound { .. })
    ));
}

#[test]
fn test_pcm16_import() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_tone(&path, 0.5, ChannelLayout::Stereo);

    let buffer = import_wav(&path).unwrap();
    assert_eq!(buffer.num_channels(), 2);
    assert_eq!(buffer.num_samples(), 24000);
    assert!((buffer.peak() - 0.2).abs() < 1e-3);
}

#[tokio::test]
async fn test_render_command_writes_tiers_and_report() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("mix.wav");
    let out_dir = dir.path().join("previews");
    write_tone(&input, 3.0, ChannelLayout::Stereo);

    let output = commands::render(&input, &out_dir, None, None).await.unwrap();

    assert_eq!(output.tier_files.len(), 3);
    for tier in TierId::ALL {
        let path = out_dir.join(format!("{}.wav", tier));
        assert!(path.exists());
        let rendered = import_wav(&path).unwrap();
        assert_eq!(rendered.num_samples(), 3 * 48000);
        assert_eq!(rendered.num_channels(), 2);
    }

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join(REPORT_FILE)).unwrap())
            .unwrap();
    assert_eq!(report["normalization"]["reference_tier"], "advanced");
    assert_eq!(report["previews"]["basic"]["succeeded"], true);
    assert!(report["previews"]["basic"]["normalized_stats"]["rms_db"].is_number());
    assert!(report["reference_stats"]["integrated_lufs"].is_number());
}

#[tokio::test]
async fn test_render_with_genre_curve() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("mix.wav");
    let genre = dir.path().join("genre.json");
    let out_dir = dir.path().join("out");
    write_tone(&input, 2.0, ChannelLayout::Mono);

    // Premium pushes the high-mid band past its limit
    let curve = GenreEqCurve {
        high_mid: 23.0,
        ..GenreEqCurve::flat()
    };
    std::fs::write(&genre, serde_json::to_string(&curve).unwrap()).unwrap();

    let output = commands::render(&input, &out_dir, None, Some(genre.as_path()))
        .await
        .unwrap();
    assert_eq!(output.tier_files.len(), 2);
    assert!(!out_dir.join("premium.wav").exists());

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output.report).unwrap()).unwrap();
    assert_eq!(report["previews"]["premium"]["succeeded"], false);
    assert!(report["previews"]["premium"]["error"].is_string());
}
