//! PCM16 to WAV container encoding, decoding and merging.
//!
//! The backend returns headerless little-endian 16-bit PCM. Encoding wraps it in
//! the canonical 44-byte RIFF/WAVE header; the payload bytes are written back
//! out unchanged.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Sample rate the speech backend produces.
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// Size of the RIFF header hound writes for 16-bit PCM with one or two channels.
pub const WAV_HEADER_LEN: usize = 44;

const BYTES_PER_SAMPLE: usize = 2;

/// Errors that can occur while encoding or decoding audio
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("audio payload is empty")]
    EmptyPayload,
    #[error("audio payload has {0} bytes, not a whole number of 16-bit samples")]
    OddPayload(usize),
    #[error("nothing to merge")]
    NothingToMerge,
    #[error("unsupported WAV format: {0}")]
    UnsupportedFormat(String),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Layout of a PCM16 stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub const fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }

    /// Bytes per second of audio.
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * u32::from(self.channels) * BYTES_PER_SAMPLE as u32
    }

    /// Bytes per frame (one sample for every channel).
    pub fn block_align(&self) -> u16 {
        self.channels * BYTES_PER_SAMPLE as u16
    }

    fn spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::mono(DEFAULT_SAMPLE_RATE)
    }
}

/// Check that `pcm` is a non-empty run of whole 16-bit frames.
pub fn validate_pcm(pcm: &[u8], format: PcmFormat) -> Result<(), CodecError> {
    if pcm.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    if pcm.len() % usize::from(format.block_align()) != 0 {
        return Err(CodecError::OddPayload(pcm.len()));
    }
    Ok(())
}

/// Wrap raw PCM16 bytes in a WAV container.
pub fn encode(pcm: &[u8], format: PcmFormat) -> Result<Vec<u8>, CodecError> {
    validate_pcm(pcm, format)?;

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + pcm.len()));
    {
        let mut writer = WavWriter::new(&mut cursor, format.spec())?;
        for frame in pcm.chunks_exact(BYTES_PER_SAMPLE) {
            writer.write_sample(i16::from_le_bytes([frame[0], frame[1]]))?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Concatenate PCM buffers in the given order and encode the result once.
///
/// No resampling, crossfade or silence is inserted between buffers.
pub fn merge<B: AsRef<[u8]>>(buffers: &[B], format: PcmFormat) -> Result<Vec<u8>, CodecError> {
    if buffers.is_empty() {
        return Err(CodecError::NothingToMerge);
    }

    let total: usize = buffers.iter().map(|b| b.as_ref().len()).sum();
    let mut joined = Vec::with_capacity(total);
    for buffer in buffers {
        joined.extend_from_slice(buffer.as_ref());
    }

    log::debug!(
        "Merging {} PCM buffers ({} bytes) at {} Hz",
        buffers.len(),
        total,
        format.sample_rate
    );
    encode(&joined, format)
}

/// Parse a PCM16 WAV file back into its format and raw payload bytes.
pub fn decode(wav: &[u8]) -> Result<(PcmFormat, Vec<u8>), CodecError> {
    let mut reader = WavReader::new(Cursor::new(wav))?;
    let spec = reader.spec();

    if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(CodecError::UnsupportedFormat(format!(
            "{} bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let mut pcm = Vec::with_capacity(reader.len() as usize * BYTES_PER_SAMPLE);
    for sample in reader.samples::<i16>() {
        pcm.extend_from_slice(&sample?.to_le_bytes());
    }

    Ok((
        PcmFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        },
        pcm,
    ))
}

/// Playback length of a PCM16 payload in seconds.
pub fn duration_secs(pcm_len: usize, format: PcmFormat) -> f64 {
    let frames = pcm_len / usize::from(format.block_align());
    frames as f64 / f64::from(format.sample_rate)
}

/// Format seconds as `m:ss`.
pub fn format_duration(secs: f64) -> String {
    let total = secs.round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
