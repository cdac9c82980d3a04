// ClipRegion - clip-relative addressing for history targets

use crate::timeline::clip::{Clip, ClipId};
use crate::timeline::graph::{GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A region expressed relative to a clip, never as absolute timeline samples
///
/// `clip_length` records the clip's length when the region was captured. If a
/// length-changing operation earlier in the same clip is later disabled, the
/// region is re-derived from its relative position within the clip instead of
/// its absolute sample index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClipRegion {
    pub clip: ClipId,
    pub offset: usize,
    pub length: usize,
    /// Clip length at capture time; 0 until stamped by the history
    #[serde(default)]
    pub clip_length: usize,
}

impl ClipRegion {
    pub fn new(clip: ClipId, offset: usize, length: usize) -> Self {
        Self {
            clip,
            offset,
            length,
            clip_length: 0,
        }
    }

    /// The whole extent of `clip`
    pub fn whole(clip: &Clip) -> Self {
        Self {
            clip: clip.id,
            offset: 0,
            length: clip.len(),
            clip_length: clip.len(),
        }
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn is_stamped(&self) -> bool {
        self.clip_length != 0
    }

    /// Copy with the reference length set to `clip`'s current length
    pub fn stamped(self, clip: &Clip) -> Self {
        Self {
            clip_length: clip.len(),
            ..self
        }
    }

    /// Strict check used when a record is captured
    pub fn validate_against(&self, clip: &Clip) -> GraphResult<()> {
        if clip.id != self.clip {
            return Err(GraphError::UnknownClip(self.clip));
        }
        if self.length == 0 || self.end() > clip.len() {
            return Err(GraphError::InvalidRegion {
                clip: self.clip,
                offset: self.offset,
                length: self.length,
                clip_len: clip.len(),
            });
        }
        Ok(())
    }

    /// Clip-relative sample range this region covers in `clip` as it is now
    ///
    /// When the clip length differs from the captured length, both ends are
    /// rescaled proportionally, so the result always lies inside the clip.
    pub fn resolve(&self, clip: &Clip) -> GraphResult<Range<usize>> {
        if clip.id != self.clip {
            return Err(GraphError::UnknownClip(self.clip));
        }
        let current = clip.len();
        if !self.is_stamped() || self.clip_length == current {
            if self.end() > current {
                return Err(GraphError::InvalidRegion {
                    clip: self.clip,
                    offset: self.offset,
                    length: self.length,
                    clip_len: current,
                });
            }
            return Ok(self.offset..self.end());
        }

        let rescale = |pos: usize| -> usize {
            let pos = pos.min(self.clip_length) as u128;
            (pos * current as u128 / self.clip_length as u128) as usize
        };
        Ok(rescale(self.offset)..rescale(self.end()))
    }
}
