//! Mono WAV encode/decode helpers.
//!
//! Used by the PCM accumulation path (cutting provider-ready chunks) and by
//! the re-encode compatibility fallback in the STT clients.

use crate::error::{KaigiError, Result};
use std::io::Cursor;

/// Downmixes any number of equal-length channels to mono by averaging.
pub fn downmix_to_mono(channels: &[Vec<f32>]) -> Vec<f32> {
    match channels {
        [] => Vec::new(),
        [only] => only.clone(),
        many => {
            let len = many.iter().map(|c| c.len()).min().unwrap_or(0);
            let n = many.len() as f32;
            (0..len)
                .map(|i| many.iter().map(|c| c[i]).sum::<f32>() / n)
                .collect()
        }
    }
}

/// Encodes mono f32 samples as a 16-bit PCM WAV byte buffer.
pub fn encode_wav_mono(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| KaigiError::WavCodec {
                message: format!("Failed to start WAV writer: {}", e),
            })?;
        for &s in samples {
            let clamped = s.clamp(-1.0, 1.0);
            writer
                .write_sample((clamped * i16::MAX as f32) as i16)
                .map_err(|e| KaigiError::WavCodec {
                    message: format!("Failed to write WAV sample: {}", e),
                })?;
        }
        writer.finalize().map_err(|e| KaigiError::WavCodec {
            message: format!("Failed to finalize WAV: {}", e),
        })?;
    }
    Ok(cursor.into_inner())
}

/// Decodes a WAV byte buffer to mono f32 samples and its sample rate.
///
/// Stereo input is downmixed; 16-bit integer and 32-bit float formats are
/// accepted.
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| KaigiError::WavCodec {
            message: format!("Failed to parse WAV data: {}", e),
        })?;

    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| KaigiError::WavCodec {
                message: format!("Failed to read WAV samples: {}", e),
            })?,
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| KaigiError::WavCodec {
                message: format!("Failed to read WAV samples: {}", e),
            })?,
    };

    let mono = if spec.channels > 1 {
        let ch = spec.channels as usize;
        interleaved
            .chunks_exact(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect()
    } else {
        interleaved
    };

    Ok((mono, spec.sample_rate))
}
