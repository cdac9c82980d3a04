use crate::audio::buffer::{BufferError, SampleBuffer};
use crate::effect::params::EffectParams;
use std::ops::Range;

/// Result type for effect processing
pub type EffectResult<T> = Result<T, EffectError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EffectError {
    #[error("Unknown effect: {0}")]
    UnknownEffect(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Region {start}..{end} out of bounds for {len} samples")]
    InvalidRegion { start: usize, end: usize, len: usize },

    #[error("Effect '{effect}' changed region length {expected} -> {actual} without declaring it")]
    LengthContract {
        effect: String,
        expected: usize,
        actual: usize,
    },

    #[error("Effect '{effect}' returned {actual} channels, expected {expected}")]
    ChannelContract {
        effect: String,
        expected: usize,
        actual: usize,
    },

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// Sample range an effect is applied to, relative to the buffer it receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The full extent of a buffer of `len` samples
    pub fn whole(len: usize) -> Self {
        Self { start: 0, end: len }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Check that the region is non-empty and lies inside `len` samples
    pub fn check(&self, len: usize) -> EffectResult<()> {
        if self.is_empty() || self.end > len {
            return Err(EffectError::InvalidRegion {
                start: self.start,
                end: self.end,
                len,
            });
        }
        Ok(())
    }
}

impl From<Range<usize>> for Region {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

/// Offline audio effect
///
/// An effect is a pure function of its inputs: it never mutates `input`,
/// never keeps state between calls, and returns the same output for the
/// same `(input, region, params)`. Rendering relies on this to reproduce a
/// project bit for bit.
pub trait Effect: Send + Sync {
    /// Stable identifier used in persisted history
    fn id(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Whether the returned audio may differ in length from `region`
    fn changes_length(&self) -> bool {
        false
    }

    /// Process `region` of `input`
    ///
    /// Returns the new audio for the region only; the caller splices it back
    /// in place of the original samples. `input` is provided whole so
    /// effects can read context around the region.
    fn apply(
        &self,
        input: &SampleBuffer,
        region: Region,
        params: &EffectParams,
    ) -> EffectResult<SampleBuffer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_bounds() {
        assert!(Region::new(0, 10).check(10).is_ok());
        assert!(Region::new(5, 11).check(10).is_err());
        assert!(Region::new(4, 4).check(10).is_err());
        assert_eq!(Region::whole(32).len(), 32);
        assert_eq!(Region::from(3..7).as_range(), 3..7);
    }
}
