// ClipGraph - ordered, gap-free sequence of clips forming the timeline
//
// The graph only knows topology: which clip comes where and which window of
// the source pool it reads. Audio-touching recipes live on TimelineState.

use crate::audio::buffer::BufferError;
use crate::timeline::clip::{Clip, ClipColor, ClipId, ClipIdAllocator, SourceRange};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Result type for clip graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised by clip graph mutations and lookups
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Unknown clip {0}")]
    UnknownClip(ClipId),

    #[error("Region {offset}+{length} is outside {clip} ({clip_len} samples)")]
    InvalidRegion {
        clip: ClipId,
        offset: usize,
        length: usize,
        clip_len: usize,
    },

    #[error("Split point {at} must fall strictly inside {clip} ({len} samples)")]
    InvalidSplit { clip: ClipId, at: usize, len: usize },

    #[error("Insert index {index} is beyond the {len} clips of the timeline")]
    InvalidIndex { index: usize, len: usize },

    #[error("Reorder must list every clip exactly once")]
    InvalidOrder,

    #[error("Cannot remove the last remaining clip")]
    LastClipDeletion,

    #[error("Timeline is not contiguous at sample {0}")]
    NotContiguous(usize),

    #[error("Duplicate clip id {0}")]
    DuplicateId(ClipId),

    #[error("Clip {clip} reads {end} samples past a source pool of {pool_len}")]
    SourceOutOfBounds {
        clip: ClipId,
        end: usize,
        pool_len: usize,
    },

    #[error("Audio error: {0}")]
    Buffer(#[from] BufferError),
}

/// The clip topology of a timeline
///
/// Clips are kept in timeline order and packed: each clip starts where the
/// previous one ends, so positions never overlap.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClipGraph {
    clips: Vec<Clip>,
    /// Number of colors handed out so far
    color_counter: u32,
}

impl ClipGraph {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Graph with one clip covering `len` pool samples
    pub fn single(id: ClipId, name: impl Into<String>, len: usize) -> Self {
        let mut graph = Self::empty();
        let color = graph.next_color();
        graph.clips.push(Clip {
            id,
            name: name.into(),
            source: SourceRange::new(0, len),
            position: 0,
            color,
        });
        graph
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn ids(&self) -> Vec<ClipId> {
        self.clips.iter().map(|c| c.id).collect()
    }

    pub fn get(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: ClipId) -> bool {
        self.get(id).is_some()
    }

    pub fn index_of(&self, id: ClipId) -> GraphResult<usize> {
        self.clips
            .iter()
            .position(|c| c.id == id)
            .ok_or(GraphError::UnknownClip(id))
    }

    pub fn require(&self, id: ClipId) -> GraphResult<&Clip> {
        self.get(id).ok_or(GraphError::UnknownClip(id))
    }

    /// Total timeline length in samples
    pub fn total_length(&self) -> usize {
        self.clips.last().map(Clip::end_position).unwrap_or(0)
    }

    /// Clip covering timeline sample `position`
    pub fn clip_at(&self, position: usize) -> Option<&Clip> {
        self.clips
            .iter()
            .find(|c| c.timeline_range().contains(&position))
    }

    /// Next distinct color in allocation order
    pub fn next_color(&mut self) -> ClipColor {
        let color = ClipColor::distinct(self.color_counter);
        self.color_counter += 1;
        color
    }

    /// Recompute positions so clips abut in order
    pub(crate) fn repack(&mut self) {
        let mut position = 0;
        for clip in &mut self.clips {
            clip.position = position;
            position += clip.len();
        }
    }

    pub(crate) fn clips_mut(&mut self) -> &mut Vec<Clip> {
        &mut self.clips
    }

    /// Insert `clip` at `index` (None = end of timeline)
    pub fn insert(&mut self, index: Option<usize>, clip: Clip) -> GraphResult<()> {
        if self.contains(clip.id) {
            return Err(GraphError::DuplicateId(clip.id));
        }
        let index = index.unwrap_or(self.clips.len());
        if index > self.clips.len() {
            return Err(GraphError::InvalidIndex {
                index,
                len: self.clips.len(),
            });
        }
        self.clips.insert(index, clip);
        self.repack();
        Ok(())
    }

    /// Replace one clip by two adjacent clips partitioning its source range
    ///
    /// Both parts receive fresh ids; the first keeps the original color.
    pub fn split(
        &mut self,
        id: ClipId,
        at: usize,
        ids: &mut ClipIdAllocator,
    ) -> GraphResult<(ClipId, ClipId)> {
        let index = self.index_of(id)?;
        let clip = self.clips[index].clone();
        if at == 0 || at >= clip.len() {
            return Err(GraphError::InvalidSplit {
                clip: id,
                at,
                len: clip.len(),
            });
        }

        let first = Clip {
            id: ids.next_id(),
            name: format!("{} (A)", clip.name),
            source: SourceRange::new(clip.source.offset, at),
            position: clip.position,
            color: clip.color,
        };
        let second = Clip {
            id: ids.next_id(),
            name: format!("{} (B)", clip.name),
            source: SourceRange::new(clip.source.offset + at, clip.len() - at),
            position: clip.position + at,
            color: self.next_color(),
        };
        let result = (first.id, second.id);
        self.clips.splice(index..=index, [first, second]);
        self.repack();
        Ok(result)
    }

    /// Remove a clip and close the gap; the last clip cannot be removed
    pub fn delete(&mut self, id: ClipId) -> GraphResult<Clip> {
        let index = self.index_of(id)?;
        if self.clips.len() <= 1 {
            return Err(GraphError::LastClipDeletion);
        }
        let removed = self.clips.remove(index);
        self.repack();
        Ok(removed)
    }

    /// Permute the timeline order without touching ids or source ranges
    pub fn reorder(&mut self, order: &[ClipId]) -> GraphResult<()> {
        if order.len() != self.clips.len() {
            return Err(GraphError::InvalidOrder);
        }
        let mut seen = HashSet::new();
        let mut reordered = Vec::with_capacity(order.len());
        for id in order {
            if !seen.insert(*id) {
                return Err(GraphError::InvalidOrder);
            }
            let clip = self.get(*id).ok_or(GraphError::InvalidOrder)?;
            reordered.push(clip.clone());
        }
        self.clips = reordered;
        self.repack();
        Ok(())
    }

    /// Change the length of a clip whose source window was re-rendered
    ///
    /// Source windows starting at or after the clip's old end move by the
    /// same amount, since the pool was spliced at that point.
    pub fn resize_clip(&mut self, id: ClipId, new_len: usize) -> GraphResult<()> {
        let index = self.index_of(id)?;
        let old = self.clips[index].source;
        let delta = new_len as isize - old.length as isize;
        if delta == 0 {
            return Ok(());
        }
        for clip in &mut self.clips {
            if clip.id != id && clip.source.offset >= old.end() {
                clip.source.offset = (clip.source.offset as isize + delta) as usize;
            }
        }
        self.clips[index].source.length = new_len;
        self.repack();
        Ok(())
    }

    /// Check the structural invariants against a pool of `pool_len` samples
    pub fn validate(&self, pool_len: usize) -> GraphResult<()> {
        let mut seen = HashSet::new();
        let mut expected = 0;
        for clip in &self.clips {
            if !seen.insert(clip.id) {
                return Err(GraphError::DuplicateId(clip.id));
            }
            if clip.position != expected {
                return Err(GraphError::NotContiguous(expected));
            }
            if clip.source.end() > pool_len {
                return Err(GraphError::SourceOutOfBounds {
                    clip: clip.id,
                    end: clip.source.end(),
                    pool_len,
                });
            }
            expected = clip.end_position();
        }
        Ok(())
    }
}
