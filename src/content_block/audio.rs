//! Audio content-block specs and the built-in PCM reader.

use byteorder::{ByteOrder, LittleEndian};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    I16,
    I32,
    F32,
}

impl SampleFormat {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::I16 => 2,
            SampleFormat::I32 | SampleFormat::F32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_format: SampleFormat,
    pub channel_count: u16,
    pub sample_rate: u32,
}

/// Decodes an interleaved PCM block into per-channel sample vectors. This
/// is a built-in format (no `Decoder` dispatch needed, unlike Opus).
pub fn decode_pcm(spec: &AudioSpec, data: &[u8]) -> Vec<Vec<f64>> {
    let bps = spec.sample_format.bytes_per_sample();
    let frame_size = bps * spec.channel_count as usize;
    let frame_count = if frame_size == 0 { 0 } else { data.len() / frame_size };
    let mut channels: Vec<Vec<f64>> = vec![Vec::with_capacity(frame_count); spec.channel_count as usize];
    for frame in 0..frame_count {
        let frame_start = frame * frame_size;
        for ch in 0..spec.channel_count as usize {
            let sample_start = frame_start + ch * bps;
            let sample_bytes = &data[sample_start..sample_start + bps];
            let value = match spec.sample_format {
                SampleFormat::I16 => LittleEndian::read_i16(sample_bytes) as f64 / i16::MAX as f64,
                SampleFormat::I32 => LittleEndian::read_i32(sample_bytes) as f64 / i32::MAX as f64,
                SampleFormat::F32 => LittleEndian::read_f32(sample_bytes) as f64,
            };
            channels[ch].push(value);
        }
    }
    channels
}
