//! WAV file I/O
//!
//! Thin adapter used by the CLI to get decoded buffers into the core and to
//! write a chosen tier back out. Integer and float WAV files are converted
//! to 32-bit float on import; the sample rate is kept as-is.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::engine::buffer::{AudioBuffer, ChannelLayout, MAX_CHANNELS};
use crate::error::{PreviewError, Result};

/// Export format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormat {
    /// Bit depth: 16, 24 (integer) or 32 (float)
    pub bit_depth: u16,
}

impl Default for ExportFormat {
    fn default() -> Self {
        ExportFormat { bit_depth: 32 }
    }
}

impl ExportFormat {
    /// 16-bit integer PCM
    pub fn pcm16() -> Self {
        ExportFormat { bit_depth: 16 }
    }

    /// 24-bit integer PCM
    pub fn pcm24() -> Self {
        ExportFormat { bit_depth: 24 }
    }
}

/// Import a WAV file as an AudioBuffer
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `Wav` - If the file is not a readable WAV file
/// * `UnsupportedChannelCount` - If the audio has more than 2 channels
/// * `EmptyAudio` - If the file holds no samples
pub fn import_wav(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(PreviewError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    if channels == 0 || channels > MAX_CHANNELS {
        return Err(PreviewError::UnsupportedChannelCount { channels });
    }

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let buffer = AudioBuffer::from_channels(deinterleave(&interleaved, channels), spec.sample_rate)?;

    debug!(
        path = %path.display(),
        channels,
        sample_rate = spec.sample_rate,
        duration_secs = buffer.duration_secs(),
        "Imported WAV"
    );

    Ok(buffer)
}

/// Export an AudioBuffer to a WAV file
pub fn export_wav(buffer: &AudioBuffer, path: &Path, format: ExportFormat) -> Result<()> {
    if !matches!(format.bit_depth, 16 | 24 | 32) {
        return Err(PreviewError::UnsupportedFormat {
            format: format!("{}-bit audio (only 16, 24, 32 supported)", format.bit_depth),
        });
    }

    let spec = WavSpec {
        channels: buffer.num_channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: format.bit_depth,
        sample_format: if format.bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let interleaved = interleave(buffer.channels());
    let mut writer = WavWriter::create(path, spec)?;

    match format.bit_depth {
        16 => {
            for sample in interleaved {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled)?;
            }
        }
        24 => {
            for sample in interleaved {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled)?;
            }
        }
        _ => {
            for sample in interleaved {
                writer.write_sample(sample)?;
            }
        }
    }

    writer.finalize()?;
    debug!(path = %path.display(), bit_depth = format.bit_depth, "Exported WAV");

    Ok(())
}

/// Generate a sine test tone at the given peak amplitude
///
/// Stereo layouts carry the same tone on both channels.
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    duration_secs: f32,
    sample_rate: u32,
    layout: ChannelLayout,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;

    let mut buffer = AudioBuffer::new(num_samples, layout, sample_rate);
    for ch in 0..buffer.num_channels() {
        for (i, sample) in buffer.channel_mut(ch).iter_mut().enumerate() {
            *sample = amplitude * (angular_freq * i as f64).sin() as f32;
        }
    }

    buffer
}

// ============================================================================
// Internal helper functions
// ============================================================================

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let samples = match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()?,
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                other => {
                    return Err(PreviewError::UnsupportedFormat {
                        format: format!("{}-bit integer audio", other),
                    })
                }
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<f32>, _>>()?
        }
    };

    Ok(samples)
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];

    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            result[ch].push(*sample);
        }
    }

    result
}

/// Interleave channels from [[L,L,...], [R,R,...]] to [L,R,L,R,...]
fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let frames = channels.first().map_or(0, Vec::len);
    let mut result = Vec::with_capacity(frames * channels.len());

    for frame in 0..frames {
        for channel in channels {
            result.push(channel[frame]);
        }
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
