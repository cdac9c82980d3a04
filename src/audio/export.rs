// Audio Export - WAV encoding and decoding of sample buffers
//
// Project media (base buffer, structural snapshots, clip payloads) is stored
// as 32-bit float WAV so a reload reproduces every sample bit for bit.
// User-facing exports may use 16 or 24-bit integer PCM instead.

use crate::audio::buffer::{BufferError, SampleBuffer};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

/// Result type for WAV encoding/decoding
pub type WavResult<T> = Result<T, WavError>;

#[derive(Debug, thiserror::Error)]
pub enum WavError {
    #[error("WAV error: {0}")]
    Hound(#[from] hound::Error),

    #[error("Invalid audio data: {0}")]
    Buffer(#[from] BufferError),

    #[error("Unsupported sample format: {bits}-bit {format:?}")]
    UnsupportedFormat { bits: u16, format: SampleFormat },

    #[error("Too many channels for WAV: {0}")]
    TooManyChannels(usize),
}

/// Sample encoding used when writing a WAV file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    /// 16-bit signed integer PCM
    Int16,
    /// 24-bit signed integer PCM
    Int24,
    /// 32-bit IEEE float, lossless for in-memory buffers
    #[default]
    Float32,
}

impl BitDepth {
    fn spec(self, channels: u16, sample_rate: u32) -> WavSpec {
        let (bits_per_sample, sample_format) = match self {
            BitDepth::Int16 => (16, SampleFormat::Int),
            BitDepth::Int24 => (24, SampleFormat::Int),
            BitDepth::Float32 => (32, SampleFormat::Float),
        };
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample,
            sample_format,
        }
    }
}

/// Audio export settings
#[derive(Debug, Clone, Default)]
pub struct ExportSettings {
    /// Sample encoding
    pub bit_depth: BitDepth,
}

/// Write `buffer` as WAV to any seekable writer
pub fn write_wav<W: Write + Seek>(
    buffer: &SampleBuffer,
    writer: W,
    settings: &ExportSettings,
) -> WavResult<()> {
    let channels = u16::try_from(buffer.channel_count())
        .map_err(|_| WavError::TooManyChannels(buffer.channel_count()))?;
    let spec = settings.bit_depth.spec(channels, buffer.sample_rate());
    let mut wav = WavWriter::new(writer, spec)?;

    for sample in buffer.to_interleaved() {
        match settings.bit_depth {
            BitDepth::Float32 => wav.write_sample(sample)?,
            BitDepth::Int16 => {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                wav.write_sample(value)?
            }
            BitDepth::Int24 => {
                const MAX_24: f32 = 8_388_607.0;
                let value = (sample.clamp(-1.0, 1.0) * MAX_24).round() as i32;
                wav.write_sample(value)?
            }
        }
    }

    wav.finalize()?;
    Ok(())
}

/// Encode `buffer` as a lossless 32-bit float WAV in memory
pub fn encode_wav(buffer: &SampleBuffer) -> WavResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_wav(buffer, &mut cursor, &ExportSettings::default())?;
    Ok(cursor.into_inner())
}

/// Write `buffer` to a WAV file on disk
pub fn export_wav<P: AsRef<Path>>(
    buffer: &SampleBuffer,
    path: P,
    settings: &ExportSettings,
) -> WavResult<()> {
    let file = std::io::BufWriter::new(std::fs::File::create(path.as_ref()).map_err(hound::Error::from)?);
    write_wav(buffer, file, settings)?;
    log::info!(
        "Exported {} samples ({} ch @ {} Hz) to {:?}",
        buffer.len(),
        buffer.channel_count(),
        buffer.sample_rate(),
        path.as_ref()
    );
    Ok(())
}

/// Decode a WAV stream into a planar buffer
///
/// Integer PCM is normalized to [-1, 1]; float data is taken verbatim.
pub fn read_wav<R: Read>(reader: R) -> WavResult<SampleBuffer> {
    let reader = WavReader::new(reader)?;
    let spec = reader.spec();
    let channel_count = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = (1_i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
        (format, bits) => return Err(WavError::UnsupportedFormat { bits, format }),
    };

    let frames = interleaved.len() / channel_count;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for frame in interleaved.chunks_exact(channel_count) {
        for (channel, sample) in channels.iter_mut().zip(frame) {
            channel.push(*sample);
        }
    }

    Ok(SampleBuffer::from_channels(channels, spec.sample_rate)?)
}

/// Decode an in-memory WAV file
pub fn decode_wav(bytes: &[u8]) -> WavResult<SampleBuffer> {
    read_wav(Cursor::new(bytes))
}

/// Load a WAV file from disk
pub fn import_wav<P: AsRef<Path>>(path: P) -> WavResult<SampleBuffer> {
    let file = std::io::BufReader::new(std::fs::File::open(path.as_ref()).map_err(hound::Error::from)?);
    let buffer = read_wav(file)?;
    log::info!(
        "Imported {:?}: {} samples, {} ch @ {} Hz",
        path.as_ref(),
        buffer.len(),
        buffer.channel_count(),
        buffer.sample_rate()
    );
    Ok(buffer)
}
