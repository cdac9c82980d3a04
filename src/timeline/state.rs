// TimelineState - source pool + clip graph, the unit of structural snapshots
//
// The pool holds every sample any clip reads. Clips address disjoint windows
// of it, so a content edit on one clip splices the pool without disturbing
// the others. The audible timeline is the concatenation of clip windows in
// graph order.

use crate::audio::buffer::SampleBuffer;
use crate::audio::dsp_utils::{FadeCurve, apply_fade_in, apply_fade_out};
use crate::timeline::clip::{Clip, ClipId, ClipIdAllocator, SourceRange};
use crate::timeline::graph::{ClipGraph, GraphError, GraphResult};
use crate::timeline::region::ClipRegion;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How a cut treats the removed span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutMode {
    /// Replace with silence of equal length
    Silence,
    /// Remove the span, shortening the timeline
    Splice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FadeDirection {
    In,
    Out,
}

/// Envelope parameters of a clip fade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FadeSpec {
    pub direction: FadeDirection,
    /// Fade length in samples; None uses the default duration
    pub length: Option<usize>,
    pub curve: FadeCurve,
    pub start_level: f32,
    pub end_level: f32,
}

impl FadeSpec {
    pub fn fade_in() -> Self {
        Self {
            direction: FadeDirection::In,
            length: None,
            curve: FadeCurve::Linear,
            start_level: 0.0,
            end_level: 1.0,
        }
    }

    pub fn fade_out() -> Self {
        Self {
            direction: FadeDirection::Out,
            length: None,
            curve: FadeCurve::Linear,
            start_level: 1.0,
            end_level: 0.0,
        }
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_curve(mut self, curve: FadeCurve) -> Self {
        self.curve = curve;
        self
    }
}

/// Source pool and clip graph at one point of the history
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineState {
    pool: SampleBuffer,
    graph: ClipGraph,
}

impl TimelineState {
    /// Assemble a state, checking the graph against the pool
    pub fn new(pool: SampleBuffer, graph: ClipGraph) -> GraphResult<Self> {
        graph.validate(pool.len())?;
        Ok(Self { pool, graph })
    }

    /// Initial project state: one clip over the whole base buffer
    ///
    /// An empty base yields an empty timeline that waits for a ClipAdd.
    pub fn from_base(base: SampleBuffer, ids: &mut ClipIdAllocator) -> Self {
        let graph = if base.is_empty() {
            ClipGraph::empty()
        } else {
            ClipGraph::single(ids.next_id(), "Clip 1", base.len())
        };
        Self { pool: base, graph }
    }

    pub fn pool(&self) -> &SampleBuffer {
        &self.pool
    }

    pub fn graph(&self) -> &ClipGraph {
        &self.graph
    }

    pub fn total_length(&self) -> usize {
        self.graph.total_length()
    }

    /// The audible timeline: clip windows concatenated in order
    pub fn render(&self) -> SampleBuffer {
        let mut out = self.pool.silence_like(0);
        for clip in self.graph.clips() {
            // Windows were validated against the pool on every mutation
            if let Ok(window) = self.pool.slice(clip.source.as_range())
                && let Ok(joined) = out.append(&window)
            {
                out = joined;
            }
        }
        out
    }

    /// Audio currently sounding inside `clip`
    pub fn clip_audio(&self, clip: ClipId) -> GraphResult<SampleBuffer> {
        let clip = self.graph.require(clip)?;
        Ok(self.pool.slice(clip.source.as_range())?)
    }

    /// Pool range addressed by a clip-relative region
    pub fn resolve(&self, region: &ClipRegion) -> GraphResult<Range<usize>> {
        let clip = self.graph.require(region.clip)?;
        let relative = region.resolve(clip)?;
        Ok(clip.source.offset + relative.start..clip.source.offset + relative.end)
    }

    /// Replace the audio of a region inside one clip
    ///
    /// `replacement` may differ in length; the clip grows or shrinks and
    /// later timeline positions move accordingly.
    pub fn replace_region(
        &mut self,
        clip: ClipId,
        pool_range: Range<usize>,
        replacement: &SampleBuffer,
    ) -> GraphResult<()> {
        let source = self.graph.require(clip)?.source;
        if pool_range.start < source.offset || pool_range.end > source.end() {
            return Err(GraphError::InvalidRegion {
                clip,
                offset: pool_range.start.saturating_sub(source.offset),
                length: pool_range.len(),
                clip_len: source.length,
            });
        }
        let new_len = source.length - pool_range.len() + replacement.len();
        self.pool = self.pool.splice(pool_range, replacement)?;
        self.graph.resize_clip(clip, new_len)?;
        Ok(())
    }

    /// Add a clip holding `content` at `index` (None = end)
    pub fn add_clip(
        &mut self,
        content: &SampleBuffer,
        name: &str,
        index: Option<usize>,
        ids: &mut ClipIdAllocator,
    ) -> GraphResult<ClipId> {
        if let Some(index) = index
            && index > self.graph.len()
        {
            return Err(GraphError::InvalidIndex {
                index,
                len: self.graph.len(),
            });
        }

        let offset = if self.pool.is_empty() && self.graph.is_empty() {
            // First audio decides the timeline format
            self.pool = content.clone();
            0
        } else {
            let offset = self.pool.len();
            self.pool = self.pool.append(content)?;
            offset
        };

        let id = ids.next_id();
        let color = self.graph.next_color();
        self.graph.insert(
            index,
            Clip {
                id,
                name: name.to_string(),
                source: SourceRange::new(offset, content.len()),
                position: 0,
                color,
            },
        )?;
        Ok(id)
    }

    pub fn split(
        &mut self,
        clip: ClipId,
        at: usize,
        ids: &mut ClipIdAllocator,
    ) -> GraphResult<(ClipId, ClipId)> {
        self.graph.split(clip, at, ids)
    }

    /// Insert a copy of a clip right after it
    pub fn duplicate(&mut self, clip: ClipId, ids: &mut ClipIdAllocator) -> GraphResult<ClipId> {
        let index = self.graph.index_of(clip)?;
        let source = self.graph.clips()[index].clone();
        let copy = self.pool.slice(source.source.as_range())?;

        let offset = self.pool.len();
        self.pool = self.pool.append(&copy)?;

        let id = ids.next_id();
        self.graph.insert(
            Some(index + 1),
            Clip {
                id,
                name: format!("{} (copy)", source.name),
                source: SourceRange::new(offset, source.len()),
                position: 0,
                color: source.color,
            },
        )?;
        Ok(id)
    }

    pub fn delete(&mut self, clip: ClipId) -> GraphResult<()> {
        self.graph.delete(clip).map(|_| ())
    }

    pub fn reorder(&mut self, order: &[ClipId]) -> GraphResult<()> {
        self.graph.reorder(order)
    }

    /// Timeline range starting inside `region.clip`, possibly spanning later clips
    pub fn timeline_span(&self, region: &ClipRegion) -> GraphResult<Range<usize>> {
        let clip = self.graph.require(region.clip)?;
        let start = clip.position + region.offset;
        let end = start + region.length;
        if region.length == 0 || region.offset >= clip.len() || end > self.total_length() {
            return Err(GraphError::InvalidRegion {
                clip: region.clip,
                offset: region.offset,
                length: region.length,
                clip_len: clip.len(),
            });
        }
        Ok(start..end)
    }

    /// Cut a timeline span
    ///
    /// Every clip the span touches is divided into before/during/after parts;
    /// divided parts get fresh ids, a clip covered entirely keeps its id. In
    /// silence mode the during part is kept and silenced, in splice mode it is
    /// dropped.
    pub fn cut(
        &mut self,
        span: Range<usize>,
        mode: CutMode,
        ids: &mut ClipIdAllocator,
    ) -> GraphResult<()> {
        let clips = self.graph.clips().to_vec();
        let mut next = Vec::with_capacity(clips.len() + 2);
        let mut pool = self.pool.clone();

        for clip in clips {
            let range = clip.timeline_range();
            if range.end <= span.start || range.start >= span.end {
                next.push(clip);
                continue;
            }

            let a = span.start.max(range.start) - range.start;
            let b = span.end.min(range.end) - range.start;
            let src = clip.source;

            if mode == CutMode::Silence {
                pool = pool.silence_range(src.offset + a..src.offset + b)?;
            }

            if a == 0 && b == clip.len() {
                if mode == CutMode::Silence {
                    next.push(clip);
                }
                continue;
            }

            let mut parts = Vec::with_capacity(3);
            if a > 0 {
                parts.push(SourceRange::new(src.offset, a));
            }
            if mode == CutMode::Silence {
                parts.push(SourceRange::new(src.offset + a, b - a));
            }
            if b < clip.len() {
                parts.push(SourceRange::new(src.offset + b, clip.len() - b));
            }

            for (i, part) in parts.into_iter().enumerate() {
                // The leading part keeps the clip's color
                let color = if i == 0 {
                    clip.color
                } else {
                    self.graph.next_color()
                };
                next.push(Clip {
                    id: ids.next_id(),
                    name: clip.name.clone(),
                    source: part,
                    position: 0,
                    color,
                });
            }
        }

        if next.is_empty() {
            return Err(GraphError::LastClipDeletion);
        }

        *self.graph.clips_mut() = next;
        self.graph.repack();
        self.pool = pool;
        Ok(())
    }

    /// Apply a fade envelope to a clip's audio in place
    ///
    /// Default length is `min(default_seconds, clip_len / 2)`.
    pub fn fade(&mut self, clip: ClipId, spec: &FadeSpec, default_seconds: f64) -> GraphResult<()> {
        let source = self.graph.require(clip)?.source;
        let default_len =
            ((default_seconds * self.pool.sample_rate() as f64).round() as usize).min(source.length / 2);
        let n = spec.length.unwrap_or(default_len).min(source.length);

        let audio = self.pool.slice(source.as_range())?;
        let faded = audio.map_channels(|_, samples| match spec.direction {
            FadeDirection::In => {
                apply_fade_in(samples, n, spec.curve, spec.start_level, spec.end_level)
            }
            FadeDirection::Out => {
                apply_fade_out(samples, n, spec.curve, spec.start_level, spec.end_level)
            }
        });
        self.pool = self.pool.splice(source.as_range(), &faded)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_state(len: usize) -> (TimelineState, ClipIdAllocator) {
        let samples: Vec<f32> = (0..len).map(|i| i as f32).collect();
        let base = SampleBuffer::from_mono(samples, 1000).unwrap();
        let mut ids = ClipIdAllocator::default();
        let state = TimelineState::from_base(base, &mut ids);
        (state, ids)
    }

    fn first_clip(state: &TimelineState) -> ClipId {
        state.graph().clips()[0].id
    }

    #[test]
    fn test_from_base_single_clip() {
        let (state, _) = ramp_state(100);
        assert_eq!(state.graph().len(), 1);
        assert_eq!(state.render(), *state.pool());
    }

    #[test]
    fn test_from_empty_base() {
        let mut ids = ClipIdAllocator::default();
        let state = TimelineState::from_base(SampleBuffer::empty(2, 44100), &mut ids);
        assert!(state.graph().is_empty());
        assert!(state.render().is_empty());
    }

    #[test]
    fn test_cut_splice_scenario() {
        let (mut state, mut ids) = ramp_state(10_000);
        state.cut(2000..4000, CutMode::Splice, &mut ids).unwrap();

        let rendered = state.render();
        assert_eq!(rendered.len(), 8000);
        let clips = state.graph().clips();
        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].timeline_range(), 0..2000);
        assert_eq!(clips[1].timeline_range(), 2000..8000);
        assert_eq!(clips[1].source, SourceRange::new(4000, 6000));
        assert_eq!(rendered.sample(0, 2000), Some(4000.0));
    }

    #[test]
    fn test_cut_silence_keeps_length() {
        let (mut state, mut ids) = ramp_state(100);
        state.cut(20..40, CutMode::Silence, &mut ids).unwrap();

        let rendered = state.render();
        assert_eq!(rendered.len(), 100);
        assert_eq!(state.graph().len(), 3);
        assert_eq!(rendered.sample(0, 19), Some(19.0));
        assert_eq!(rendered.sample(0, 20), Some(0.0));
        assert_eq!(rendered.sample(0, 39), Some(0.0));
        assert_eq!(rendered.sample(0, 40), Some(40.0));
    }

    #[test]
    fn test_cut_spanning_two_clips() {
        let (mut state, mut ids) = ramp_state(100);
        let original = first_clip(&state);
        state.split(original, 50, &mut ids).unwrap();
        state.cut(40..60, CutMode::Splice, &mut ids).unwrap();

        assert_eq!(state.graph().len(), 2);
        let rendered = state.render();
        assert_eq!(rendered.len(), 80);
        assert_eq!(rendered.sample(0, 39), Some(39.0));
        assert_eq!(rendered.sample(0, 40), Some(60.0));
    }

    #[test]
    fn test_cut_everything_rejected() {
        let (mut state, mut ids) = ramp_state(100);
        let before = state.clone();
        assert_eq!(
            state.cut(0..100, CutMode::Splice, &mut ids).unwrap_err(),
            GraphError::LastClipDeletion
        );
        assert_eq!(state, before);
    }

    #[test]
    fn test_duplicate_is_independent() {
        let (mut state, mut ids) = ramp_state(10);
        let original = first_clip(&state);
        let copy = state.duplicate(original, &mut ids).unwrap();

        assert_eq!(state.graph().index_of(copy).unwrap(), 1);
        assert_eq!(state.render().len(), 20);

        // Silencing the copy leaves the original untouched
        let range = state.resolve(&ClipRegion::new(copy, 0, 10)).unwrap();
        let silence = state.pool().silence_like(10);
        state.replace_region(copy, range, &silence).unwrap();
        let rendered = state.render();
        assert_eq!(rendered.sample(0, 5), Some(5.0));
        assert_eq!(rendered.sample(0, 15), Some(0.0));
    }

    #[test]
    fn test_replace_region_with_longer_audio() {
        let (mut state, mut ids) = ramp_state(100);
        let original = first_clip(&state);
        let (a, b) = state.split(original, 50, &mut ids).unwrap();

        let range = state.resolve(&ClipRegion::new(a, 0, 50)).unwrap();
        let longer = state.pool().silence_like(80);
        state.replace_region(a, range, &longer).unwrap();

        assert_eq!(state.graph().require(a).unwrap().len(), 80);
        let second = state.graph().require(b).unwrap();
        assert_eq!(second.position, 80);
        assert_eq!(state.clip_audio(b).unwrap().sample(0, 0), Some(50.0));
        assert_eq!(state.render().len(), 130);
    }

    #[test]
    fn test_add_clip_to_empty_timeline() {
        let mut ids = ClipIdAllocator::default();
        let mut state = TimelineState::from_base(SampleBuffer::empty(1, 1000), &mut ids);
        let content = SampleBuffer::from_mono(vec![0.25; 10], 1000).unwrap();
        let id = state.add_clip(&content, "Import", None, &mut ids).unwrap();

        assert_eq!(state.graph().ids(), vec![id]);
        assert_eq!(state.render(), content);
    }

    #[test]
    fn test_add_clip_at_index() {
        let (mut state, mut ids) = ramp_state(10);
        let content = SampleBuffer::from_mono(vec![-1.0; 5], 1000).unwrap();
        let id = state.add_clip(&content, "Front", Some(0), &mut ids).unwrap();
        assert_eq!(state.graph().clips()[0].id, id);
        assert_eq!(state.render().sample(0, 5), Some(0.0));
        assert!(
            state
                .add_clip(&content, "Far", Some(9), &mut ids)
                .is_err()
        );
    }

    #[test]
    fn test_fade_out_default_length() {
        let base = SampleBuffer::from_mono(vec![1.0; 100], 100).unwrap();
        let mut ids = ClipIdAllocator::default();
        let mut state = TimelineState::from_base(base, &mut ids);
        let clip = first_clip(&state);

        // 0.5 s at 100 Hz = 50 samples, capped at half the clip
        state.fade(clip, &FadeSpec::fade_out(), 0.5).unwrap();
        let rendered = state.render();
        assert_eq!(rendered.sample(0, 49), Some(1.0));
        assert_eq!(rendered.sample(0, 99), Some(0.0));
        assert_eq!(rendered.len(), 100);
    }

    #[test]
    fn test_timeline_span_bounds() {
        let (state, _) = ramp_state(100);
        let clip = first_clip(&state);
        assert_eq!(
            state.timeline_span(&ClipRegion::new(clip, 10, 20)).unwrap(),
            10..30
        );
        assert!(state.timeline_span(&ClipRegion::new(clip, 90, 20)).is_err());
    }
}
