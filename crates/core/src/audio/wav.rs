use super::AudioError;

/// Size of a canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

/// Format fields of a canonical WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavFormat {
    /// Read the format from the header of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, AudioError> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(AudioError::InvalidWav(format!(
                "{} bytes is shorter than a WAV header",
                bytes.len()
            )));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(AudioError::InvalidWav("missing RIFF/WAVE markers".to_string()));
        }

        Ok(Self {
            channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            bits_per_sample: read_u16(bytes, 34),
        })
    }

    pub fn block_align(&self) -> Result<u16, AudioError> {
        self.channels
            .checked_mul(self.bits_per_sample / 8)
            .ok_or_else(|| AudioError::InvalidWav("block align overflows".to_string()))
    }

    pub fn byte_rate(&self) -> Result<u32, AudioError> {
        self.sample_rate
            .checked_mul(u32::from(self.block_align()?))
            .ok_or_else(|| AudioError::InvalidWav("byte rate overflows".to_string()))
    }

    fn header(&self, data_len: u32) -> Result<[u8; WAV_HEADER_LEN], AudioError> {
        let riff_len = data_len
            .checked_add(36)
            .ok_or_else(|| AudioError::InvalidWav("combined audio exceeds 4 GiB".to_string()))?;

        let mut header = [0u8; WAV_HEADER_LEN];
        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&riff_len.to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&16u32.to_le_bytes());
        header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate()?.to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align()?.to_le_bytes());
        header[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&data_len.to_le_bytes());
        Ok(header)
    }
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Join WAV buffers that share one format into a single WAV.
///
/// The format comes from the first buffer; the PCM data after each
/// 44-byte header is appended in order. A single buffer is returned as is.
pub fn concatenate_wav(buffers: &[Vec<u8>]) -> Result<Vec<u8>, AudioError> {
    match buffers {
        [] => return Err(AudioError::Empty),
        [only] => return Ok(only.clone()),
        _ => {}
    }

    let format = WavFormat::parse(&buffers[0])?;
    let mut data_len: usize = 0;
    for (i, buffer) in buffers.iter().enumerate() {
        if buffer.len() < WAV_HEADER_LEN {
            return Err(AudioError::InvalidWav(format!(
                "buffer {} is shorter than a WAV header",
                i
            )));
        }
        data_len += buffer.len() - WAV_HEADER_LEN;
    }
    let data_len = u32::try_from(data_len)
        .map_err(|_| AudioError::InvalidWav("combined audio exceeds 4 GiB".to_string()))?;

    let header = format.header(data_len)?;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);
    out.extend_from_slice(&header);
    for buffer in buffers {
        out.extend_from_slice(&buffer[WAV_HEADER_LEN..]);
    }
    Ok(out)
}

/// Duration of a canonical WAV in seconds, or 0.0 when it cannot be told.
pub fn wav_duration_secs(bytes: &[u8]) -> f64 {
    if bytes.len() < WAV_HEADER_LEN {
        return 0.0;
    }
    let byte_rate = read_u32(bytes, 28);
    if byte_rate == 0 {
        return 0.0;
    }
    (bytes.len() - WAV_HEADER_LEN) as f64 / byte_rate as f64
}
