// SampleBuffer - Immutable audio data shared by reference
//
// A buffer is a sequence of segments, each a window into reference-counted
// planar sample storage. Slicing, concatenation and splicing only rearrange
// segment windows, so structural snapshots share the audio they did not touch
// instead of copying it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Range;
use std::sync::Arc;

/// Result type for buffer operations
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors raised when building or combining buffers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("Sample rate must be positive")]
    ZeroSampleRate,

    #[error("Buffer must have at least one channel")]
    NoChannels,

    #[error("Channels have different lengths ({0} vs {1})")]
    RaggedChannels(usize, usize),

    #[error("Sample rate mismatch: {0} Hz vs {1} Hz")]
    SampleRateMismatch(u32, u32),

    #[error("Channel count mismatch: {0} vs {1}")]
    ChannelMismatch(usize, usize),

    #[error("Range {start}..{end} out of bounds for buffer of {len} samples")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },
}

#[derive(Debug)]
struct SegmentData {
    channels: Vec<Vec<f32>>,
}

#[derive(Debug, Clone)]
struct Segment {
    data: Arc<SegmentData>,
    offset: usize,
    len: usize,
}

impl Segment {
    fn channel(&self, channel: usize) -> &[f32] {
        &self.data.channels[channel][self.offset..self.offset + self.len]
    }

    /// Whether `next` continues this segment in the same storage
    fn continues_with(&self, next: &Segment) -> bool {
        Arc::ptr_eq(&self.data, &next.data) && self.offset + self.len == next.offset
    }
}

/// Immutable multi-channel audio buffer
///
/// Cloning is cheap (segment windows are reference counted). Two buffers are
/// equal when they have the same format and bit-identical samples, regardless
/// of how their segments are laid out.
#[derive(Clone)]
pub struct SampleBuffer {
    channel_count: usize,
    sample_rate: u32,
    len: usize,
    segments: Vec<Segment>,
}

impl SampleBuffer {
    /// Build a buffer from planar channel data
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> BufferResult<Self> {
        if sample_rate == 0 {
            return Err(BufferError::ZeroSampleRate);
        }
        let first_len = channels.first().map(Vec::len).ok_or(BufferError::NoChannels)?;
        if let Some(bad) = channels.iter().find(|c| c.len() != first_len) {
            return Err(BufferError::RaggedChannels(first_len, bad.len()));
        }

        let channel_count = channels.len();
        let segments = if first_len == 0 {
            Vec::new()
        } else {
            vec![Segment {
                data: Arc::new(SegmentData { channels }),
                offset: 0,
                len: first_len,
            }]
        };

        Ok(Self {
            channel_count,
            sample_rate,
            len: first_len,
            segments,
        })
    }

    /// Build a mono buffer
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> BufferResult<Self> {
        Self::from_channels(vec![samples], sample_rate)
    }

    /// Empty buffer with the given format
    pub fn empty(channel_count: usize, sample_rate: u32) -> Self {
        Self {
            channel_count: channel_count.max(1),
            sample_rate: sample_rate.max(1),
            len: 0,
            segments: Vec::new(),
        }
    }

    /// Digital silence with the given format
    pub fn silence(channel_count: usize, len: usize, sample_rate: u32) -> Self {
        let channel_count = channel_count.max(1);
        let sample_rate = sample_rate.max(1);
        if len == 0 {
            return Self::empty(channel_count, sample_rate);
        }
        Self {
            channel_count,
            sample_rate,
            len,
            segments: vec![Segment {
                data: Arc::new(SegmentData {
                    channels: vec![vec![0.0; len]; channel_count],
                }),
                offset: 0,
                len,
            }],
        }
    }

    /// Silence with the same format as `self`
    pub fn silence_like(&self, len: usize) -> Self {
        Self::silence(self.channel_count, len, self.sample_rate)
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f64 {
        self.len as f64 / self.sample_rate as f64
    }

    /// Number of storage windows backing this buffer
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Whether `other` can be concatenated with `self`
    pub fn check_format(&self, other: &SampleBuffer) -> BufferResult<()> {
        if self.sample_rate != other.sample_rate {
            return Err(BufferError::SampleRateMismatch(
                self.sample_rate,
                other.sample_rate,
            ));
        }
        if self.channel_count != other.channel_count {
            return Err(BufferError::ChannelMismatch(
                self.channel_count,
                other.channel_count,
            ));
        }
        Ok(())
    }

    /// Read a single sample
    pub fn sample(&self, channel: usize, index: usize) -> Option<f32> {
        if channel >= self.channel_count || index >= self.len {
            return None;
        }
        let mut remaining = index;
        for segment in &self.segments {
            if remaining < segment.len {
                return Some(segment.channel(channel)[remaining]);
            }
            remaining -= segment.len;
        }
        None
    }

    /// Copy one channel into a contiguous vector
    pub fn channel_samples(&self, channel: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len);
        if channel < self.channel_count {
            for segment in &self.segments {
                out.extend_from_slice(segment.channel(channel));
            }
        }
        out
    }

    /// Copy all channels into contiguous planar vectors
    pub fn to_channels(&self) -> Vec<Vec<f32>> {
        (0..self.channel_count)
            .map(|ch| self.channel_samples(ch))
            .collect()
    }

    /// Interleaved copy (frame-major), as written to audio files
    pub fn to_interleaved(&self) -> Vec<f32> {
        let channels = self.to_channels();
        let mut out = Vec::with_capacity(self.len * self.channel_count);
        for i in 0..self.len {
            for channel in &channels {
                out.push(channel[i]);
            }
        }
        out
    }

    fn check_range(&self, range: &Range<usize>) -> BufferResult<()> {
        if range.start > range.end || range.end > self.len {
            return Err(BufferError::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                len: self.len,
            });
        }
        Ok(())
    }

    /// Sub-range of this buffer sharing the same storage
    pub fn slice(&self, range: Range<usize>) -> BufferResult<Self> {
        self.check_range(&range)?;

        let mut segments = Vec::new();
        let mut cursor = 0;
        for segment in &self.segments {
            let seg_start = cursor;
            let seg_end = cursor + segment.len;
            cursor = seg_end;

            let start = range.start.max(seg_start);
            let end = range.end.min(seg_end);
            if start >= end {
                continue;
            }
            segments.push(Segment {
                data: Arc::clone(&segment.data),
                offset: segment.offset + (start - seg_start),
                len: end - start,
            });
        }

        Ok(Self {
            channel_count: self.channel_count,
            sample_rate: self.sample_rate,
            len: range.end - range.start,
            segments,
        })
    }

    /// Concatenate buffers end to end
    ///
    /// All parts must share the format of the first one. An empty slice
    /// yields `None` since there is no format to inherit.
    pub fn concat(parts: &[SampleBuffer]) -> BufferResult<Option<Self>> {
        let Some(first) = parts.first() else {
            return Ok(None);
        };

        let mut out = Self::empty(first.channel_count, first.sample_rate);
        for part in parts {
            first.check_format(part)?;
            for segment in &part.segments {
                out.push_segment(segment.clone());
            }
            out.len += part.len;
        }
        Ok(Some(out))
    }

    fn push_segment(&mut self, segment: Segment) {
        if segment.len == 0 {
            return;
        }
        if let Some(last) = self.segments.last_mut()
            && last.continues_with(&segment)
        {
            last.len += segment.len;
            return;
        }
        self.segments.push(segment);
    }

    /// Append `other` after `self`
    pub fn append(&self, other: &SampleBuffer) -> BufferResult<Self> {
        self.check_format(other)?;
        let mut out = self.clone();
        for segment in &other.segments {
            out.push_segment(segment.clone());
        }
        out.len += other.len;
        Ok(out)
    }

    /// Replace `range` with `replacement`, which may have a different length
    pub fn splice(&self, range: Range<usize>, replacement: &SampleBuffer) -> BufferResult<Self> {
        self.check_range(&range)?;
        self.check_format(replacement)?;

        let before = self.slice(0..range.start)?;
        let after = self.slice(range.end..self.len)?;
        before.append(replacement)?.append(&after)
    }

    /// Remove `range`, shortening the buffer
    pub fn remove_range(&self, range: Range<usize>) -> BufferResult<Self> {
        let replacement = self.silence_like(0);
        self.splice(range, &replacement)
    }

    /// Replace `range` with silence of equal length
    pub fn silence_range(&self, range: Range<usize>) -> BufferResult<Self> {
        self.check_range(&range)?;
        let replacement = self.silence_like(range.end - range.start);
        self.splice(range, &replacement)
    }

    /// Build a new buffer by transforming every channel of `self`
    pub fn map_channels<F>(&self, mut f: F) -> Self
    where
        F: FnMut(usize, &mut Vec<f32>),
    {
        let mut channels = self.to_channels();
        for (index, channel) in channels.iter_mut().enumerate() {
            f(index, channel);
        }
        let len = channels.first().map(Vec::len).unwrap_or(0);
        if len == 0 {
            return self.silence_like(0);
        }
        Self {
            channel_count: self.channel_count,
            sample_rate: self.sample_rate,
            len,
            segments: vec![Segment {
                data: Arc::new(SegmentData { channels }),
                offset: 0,
                len,
            }],
        }
    }

    /// Iterate over (channel, samples) windows in storage order
    fn windows(&self, channel: usize) -> impl Iterator<Item = &[f32]> + '_ {
        self.segments.iter().map(move |s| s.channel(channel))
    }
}

impl PartialEq for SampleBuffer {
    fn eq(&self, other: &Self) -> bool {
        if self.channel_count != other.channel_count
            || self.sample_rate != other.sample_rate
            || self.len != other.len
        {
            return false;
        }
        (0..self.channel_count).all(|ch| {
            self.windows(ch)
                .flat_map(|w| w.iter())
                .zip(other.windows(ch).flat_map(|w| w.iter()))
                .all(|(a, b)| a.to_bits() == b.to_bits())
        })
    }
}

impl Eq for SampleBuffer {}

// Consistent with `eq`: segment layout is ignored, sample bits are not
impl Hash for SampleBuffer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.channel_count.hash(state);
        self.sample_rate.hash(state);
        self.len.hash(state);
        for ch in 0..self.channel_count {
            for window in self.windows(ch) {
                for s in window {
                    s.to_bits().hash(state);
                }
            }
        }
    }
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("len", &self.len)
            .field("segments", &self.segments.len())
            .finish()
    }
}
