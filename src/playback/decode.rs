//! PCM decoding.

use crate::error::{Error, Result};
use crate::protocol::decode_standard;

use super::device::{AudioFormat, SampleBuffer};

/// Decodes standard base64 16-bit little-endian PCM into a sample buffer.
///
/// # Errors
///
/// - [`Error::Base64`] if `data` is not valid base64
/// - [`Error::Decode`] if the byte count is not a whole number of frames
pub fn decode_pcm16(data: &str, format: AudioFormat) -> Result<SampleBuffer> {
    let bytes = decode_standard(data)?;

    let frame_bytes = 2 * usize::from(format.channels.max(1));
    if bytes.len() % frame_bytes != 0 {
        return Err(Error::decode(format!(
            "PCM16 payload of {} bytes is not a multiple of {frame_bytes}",
            bytes.len()
        )));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32_768.0)
        .collect();

    Ok(SampleBuffer { samples, format })
}
