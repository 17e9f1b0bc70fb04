//! Wraps raw little-endian PCM in a WAV container.

use crate::defaults;
use crate::error::{Result, StagecueError};
use std::io::Cursor;

/// Layout of raw PCM audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmSpec {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for PcmSpec {
    fn default() -> Self {
        Self {
            sample_rate: defaults::TTS_SAMPLE_RATE,
            channels: defaults::TTS_CHANNELS,
            bits_per_sample: defaults::TTS_BITS_PER_SAMPLE,
        }
    }
}

/// Encodes little-endian PCM as a WAV file.
///
/// Supports 8, 16 and 32 bit samples. 8 bit input is unsigned, wider samples
/// are signed. A trailing partial frame is dropped.
pub fn pcm_to_wav(pcm: &[u8], spec: PcmSpec) -> Result<Vec<u8>> {
    spec.check()?;
    let wav_spec = hound::WavSpec {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };
    let encode_err = |e: hound::Error| StagecueError::Synthesis {
        message: format!("Failed to encode WAV: {}", e),
    };

    let pcm = &pcm[..pcm.len() - pcm.len() % spec.block_align()];
    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, wav_spec).map_err(encode_err)?;
        match spec.bits_per_sample {
            8 => {
                for &byte in pcm {
                    writer.write_sample((i16::from(byte) - 128) as i8).map_err(encode_err)?;
                }
            }
            16 => {
                for pair in pcm.chunks_exact(2) {
                    let sample = i16::from_le_bytes([pair[0], pair[1]]);
                    writer.write_sample(sample).map_err(encode_err)?;
                }
            }
            _ => {
                for quad in pcm.chunks_exact(4) {
                    let sample = i32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]);
                    writer.write_sample(sample).map_err(encode_err)?;
                }
            }
        }
        writer.finalize().map_err(encode_err)?;
    }
    Ok(cursor.into_inner())
}

impl PcmSpec {
    /// Rejects layouts the encoder cannot write.
    pub fn check(&self) -> Result<()> {
        let problem = if self.channels == 0 {
            "channel count must be at least 1".to_string()
        } else if self.sample_rate == 0 {
            "sample rate must be at least 1 Hz".to_string()
        } else if !matches!(self.bits_per_sample, 8 | 16 | 32) {
            format!("Unsupported PCM bit depth: {}", self.bits_per_sample)
        } else {
            return Ok(());
        };
        Err(StagecueError::Synthesis { message: problem })
    }

    /// Bytes per frame (one sample for every channel).
    pub fn block_align(&self) -> usize {
        usize::from(self.channels) * usize::from(self.bits_per_sample / 8)
    }
}
