// Render Engine - anchor snapshot + content replay
//
// The most recent structural record fixes the clip graph; its snapshot is
// the starting point. Every enabled content record after it is replayed in
// log order against that graph. A render never mutates the log and, for a
// given log and base state, always yields the same samples.

use crate::audio::buffer::{BufferError, SampleBuffer};
use crate::automation::{AutomationError, apply_automation};
use crate::effect::{EffectError, EffectRegistry, Region};
use crate::history::log::OperationLog;
use crate::history::record::{ContentOp, OperationRecord, RecordBody, RecordId, StructuralOp};
use crate::render::cache::{CacheKey, CachedRender, RenderCache};
use crate::render::cancel::CancelToken;
use crate::timeline::{ClipIdAllocator, GraphError, TimelineState};
use std::sync::Arc;

/// Result type for rendering
pub type RenderResult<T> = Result<T, RenderError>;

/// Intermediate states are cached every this many replayed records
const CHECKPOINT_STRIDE: usize = 8;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("Effect '{effect_id}' failed on record {record}: {source}")]
    Registry {
        effect_id: String,
        record: RecordId,
        #[source]
        source: EffectError,
    },

    #[error("Record {record} uses unknown effect '{effect_id}'")]
    UnknownEffect { effect_id: String, record: RecordId },

    #[error("Render cancelled")]
    Cancelled,

    #[error("Record {record} targets an invalid region: {source}")]
    InvalidRegion {
        record: RecordId,
        #[source]
        source: GraphError,
    },

    #[error("Structural operation failed: {0}")]
    Structural(#[from] GraphError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
}

/// Engine tuning, usually taken from `EngineConfig`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub automation_chunk_size: usize,
    pub clip_fade_seconds: f64,
    pub cache_capacity: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            automation_chunk_size: crate::automation::DEFAULT_CHUNK_SIZE,
            clip_fade_seconds: 0.5,
            cache_capacity: 32,
        }
    }
}

/// A completed render
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// The audible timeline
    pub buffer: SampleBuffer,
    /// Pool and graph after replay
    pub state: Arc<TimelineState>,
    /// Structural record the replay started from; None = base state
    pub anchor: Option<RecordId>,
    /// Enabled content records replayed, in order (orphans included)
    pub replayed: Vec<RecordId>,
    /// Content records skipped because their clip no longer exists
    pub orphaned: Vec<RecordId>,
}

impl RenderOutput {
    pub fn has_orphans(&self) -> bool {
        !self.orphaned.is_empty()
    }
}

/// Deterministic renderer over an operation log
pub struct RenderEngine {
    registry: Arc<EffectRegistry>,
    settings: RenderSettings,
    cache: RenderCache,
}

impl RenderEngine {
    pub fn new(registry: Arc<EffectRegistry>, settings: RenderSettings) -> Self {
        Self {
            registry,
            settings,
            cache: RenderCache::new(settings.cache_capacity),
        }
    }

    pub fn registry(&self) -> &Arc<EffectRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Render the whole log
    pub fn render(&self, log: &OperationLog, base: &Arc<TimelineState>) -> RenderResult<RenderOutput> {
        self.render_prefix(log, base, u64::MAX, None)
    }

    /// Render the whole log, polling `cancel` between units of work
    pub fn render_with_cancel(
        &self,
        log: &OperationLog,
        base: &Arc<TimelineState>,
        cancel: &CancelToken,
    ) -> RenderResult<RenderOutput> {
        self.render_prefix(log, base, u64::MAX, Some(cancel))
    }

    /// Render only the records with `created_order <= limit`
    pub fn render_until(
        &self,
        log: &OperationLog,
        base: &Arc<TimelineState>,
        limit: u64,
    ) -> RenderResult<RenderOutput> {
        self.render_prefix(log, base, limit, None)
    }

    fn render_prefix(
        &self,
        log: &OperationLog,
        base: &Arc<TimelineState>,
        limit: u64,
        cancel: Option<&CancelToken>,
    ) -> RenderResult<RenderOutput> {
        let records: Vec<&OperationRecord> =
            log.iter().filter(|r| r.created_order <= limit).collect();
        let anchor_index = records.iter().rposition(|r| r.is_structural());

        let (start, anchor, tail) = match anchor_index {
            Some(index) => match &records[index].body {
                RecordBody::Structural { snapshot, .. } => {
                    (Arc::clone(snapshot), Some(records[index].id), &records[index + 1..])
                }
                RecordBody::Content { .. } => (Arc::clone(base), None, &records[..]),
            },
            None => (Arc::clone(base), None, &records[..]),
        };

        let pending: Vec<(RecordId, &ContentOp)> = tail
            .iter()
            .filter_map(|r| match &r.body {
                RecordBody::Content { op, enabled: true } => Some((r.id, op)),
                _ => None,
            })
            .collect();
        let ids: Vec<RecordId> = pending.iter().map(|(id, _)| *id).collect();
        let origin = Arc::clone(&start);

        let (done, cached) = self
            .cache
            .longest_prefix(&origin, anchor, &ids)
            .unwrap_or((0, CachedRender {
                state: start,
                orphaned: Vec::new(),
            }));

        if done == ids.len() {
            log::debug!("Render cache hit ({} records)", ids.len());
            return Ok(Self::output(cached.state, anchor, ids, cached.orphaned));
        }

        let mut state = Arc::unwrap_or_clone(cached.state);
        let mut orphaned = cached.orphaned;

        for (i, (record, op)) in pending.iter().enumerate().skip(done) {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(RenderError::Cancelled);
            }
            if !self.apply_content(&mut state, *record, op, cancel)? {
                orphaned.push(*record);
            }
            let covered = i + 1;
            if covered % CHECKPOINT_STRIDE == 0 && covered < ids.len() {
                self.cache.insert(
                    CacheKey::new(&origin, anchor, &ids[..covered]),
                    CachedRender {
                        state: Arc::new(state.clone()),
                        orphaned: orphaned.clone(),
                    },
                );
            }
        }

        let state = Arc::new(state);
        self.cache.insert(
            CacheKey::new(&origin, anchor, &ids),
            CachedRender {
                state: Arc::clone(&state),
                orphaned: orphaned.clone(),
            },
        );
        log::debug!(
            "Rendered {} content records on anchor {:?} ({} orphaned)",
            ids.len() - done,
            anchor,
            orphaned.len()
        );
        Ok(Self::output(state, anchor, ids, orphaned))
    }

    fn output(
        state: Arc<TimelineState>,
        anchor: Option<RecordId>,
        replayed: Vec<RecordId>,
        orphaned: Vec<RecordId>,
    ) -> RenderOutput {
        RenderOutput {
            buffer: state.render(),
            state,
            anchor,
            replayed,
            orphaned,
        }
    }

    /// Replay one content record; Ok(false) when its clip is gone
    fn apply_content(
        &self,
        state: &mut TimelineState,
        record: RecordId,
        op: &ContentOp,
        cancel: Option<&CancelToken>,
    ) -> RenderResult<bool> {
        let target = op.target();
        let Some(clip) = state.graph().get(target.clip) else {
            log::warn!(
                "Record {} targets missing {}, excluded from render",
                record,
                target.clip
            );
            return Ok(false);
        };
        let relative = target
            .resolve(clip)
            .map_err(|source| RenderError::InvalidRegion { record, source })?;
        if relative.is_empty() {
            log::debug!("Record {} resolves to an empty region, skipped", record);
            return Ok(true);
        }
        let source = clip.source;

        let clip_audio = state.pool().slice(source.as_range())?;
        let region = Region::from(relative.clone());
        let processed = match op {
            ContentOp::Effect {
                effect_id, params, ..
            } => self
                .registry
                .apply(effect_id, &clip_audio, region, params)
                .map_err(|e| registry_error(effect_id, record, e))?,
            ContentOp::Automation {
                effect_id,
                base_params,
                lanes,
                ..
            } => apply_automation(
                &self.registry,
                effect_id,
                &clip_audio,
                region,
                base_params,
                lanes,
                self.settings.automation_chunk_size,
                cancel,
            )
            .map_err(|e| match e {
                AutomationError::Effect { source, .. } => registry_error(effect_id, record, source),
                AutomationError::Cancelled => RenderError::Cancelled,
                AutomationError::Buffer(e) => RenderError::Buffer(e),
                AutomationError::ZeroChunkSize => RenderError::Registry {
                    effect_id: effect_id.clone(),
                    record,
                    source: EffectError::Processing("automation chunk size is zero".to_string()),
                },
            })?,
        };

        let pool_range = source.offset + relative.start..source.offset + relative.end;
        state.replace_region(target.clip, pool_range, &processed)?;
        Ok(true)
    }

    /// State after applying a structural operation on top of `state`
    pub fn apply_structural(
        &self,
        state: &TimelineState,
        op: &StructuralOp,
        ids: &mut ClipIdAllocator,
    ) -> RenderResult<TimelineState> {
        let mut next = state.clone();
        match op {
            StructuralOp::ClipAdd {
                content,
                name,
                index,
            } => {
                next.add_clip(content, name, *index, ids)?;
            }
            StructuralOp::Recording { content, name } => {
                next.add_clip(content, name, None, ids)?;
            }
            StructuralOp::ClipSplit { clip, at } => {
                next.split(*clip, *at, ids)?;
            }
            StructuralOp::ClipDuplicate { clip } => {
                next.duplicate(*clip, ids)?;
            }
            StructuralOp::ClipDelete { clip } => next.delete(*clip)?,
            StructuralOp::ClipReorder { order } => next.reorder(order)?,
            StructuralOp::Cut { target, mode } => {
                let span = next.timeline_span(target)?;
                next.cut(span, *mode, ids)?;
            }
            StructuralOp::Fade { clip, spec } => {
                next.fade(*clip, spec, self.settings.clip_fade_seconds)?
            }
        }
        Ok(next)
    }
}

fn registry_error(effect_id: &str, record: RecordId, source: EffectError) -> RenderError {
    match source {
        EffectError::UnknownEffect(_) => RenderError::UnknownEffect {
            effect_id: effect_id.to_string(),
            record,
        },
        source => RenderError::Registry {
            effect_id: effect_id.to_string(),
            record,
            source,
        },
    }
}

impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("settings", &self.settings)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectParams;
    use crate::history::record::RecordMeta;
    use crate::timeline::{ClipId, ClipRegion, CutMode};

    fn engine() -> RenderEngine {
        RenderEngine::new(Arc::new(EffectRegistry::with_builtins()), RenderSettings::default())
    }

    fn base(len: usize) -> (Arc<TimelineState>, ClipIdAllocator) {
        let samples: Vec<f32> = (0..len).map(|i| ((i % 100) as f32 / 100.0) - 0.5).collect();
        let mut ids = ClipIdAllocator::default();
        let state = TimelineState::from_base(SampleBuffer::from_mono(samples, 1000).unwrap(), &mut ids);
        (Arc::new(state), ids)
    }

    fn effect_record(id: u64, clip: ClipId, offset: usize, length: usize, gain_pct: f64) -> OperationRecord {
        OperationRecord {
            id: RecordId(id),
            created_order: id,
            body: RecordBody::Content {
                op: ContentOp::Effect {
                    effect_id: "volume".into(),
                    params: EffectParams::new().with("gain_pct", gain_pct),
                    target: ClipRegion::new(clip, offset, length),
                },
                enabled: true,
            },
            meta: RecordMeta::new("Apply Volume"),
        }
    }

    fn structural_record(
        engine: &RenderEngine,
        id: u64,
        state: &TimelineState,
        op: StructuralOp,
        ids: &mut ClipIdAllocator,
    ) -> OperationRecord {
        let snapshot = engine.apply_structural(state, &op, ids).unwrap();
        OperationRecord {
            id: RecordId(id),
            created_order: id,
            body: RecordBody::Structural {
                op,
                snapshot: Arc::new(snapshot),
            },
            meta: RecordMeta::new("Structural"),
        }
    }

    #[test]
    fn test_empty_log_renders_base() {
        let engine = engine();
        let (base, _) = base(500);
        let out = engine.render(&OperationLog::new(), &base).unwrap();
        assert_eq!(out.buffer, base.render());
        assert_eq!(out.anchor, None);
    }

    #[test]
    fn test_effect_applies_to_region_only() {
        let engine = engine();
        let (base, _) = base(1000);
        let clip = base.graph().clips()[0].id;
        let log = OperationLog::from_records(vec![effect_record(1, clip, 100, 200, 50.0)]).unwrap();

        let out = engine.render(&log, &base).unwrap();
        let original = base.render();
        assert_eq!(out.buffer.len(), 1000);
        assert_eq!(out.buffer.sample(0, 50), original.sample(0, 50));
        assert_eq!(
            out.buffer.sample(0, 150),
            original.sample(0, 150).map(|s| s * 0.5)
        );
        assert_eq!(out.buffer.sample(0, 300), original.sample(0, 300));
    }

    #[test]
    fn test_render_starts_from_anchor() {
        let engine = engine();
        let (base, mut ids) = base(1000);
        let clip = base.graph().clips()[0].id;
        let split = structural_record(
            &engine,
            2,
            &base,
            StructuralOp::ClipSplit { clip, at: 400 },
            &mut ids,
        );
        let snapshot = Arc::clone(split.snapshot().unwrap());
        let second = snapshot.graph().clips()[1].id;
        // Record 1 targets the pre-split clip and sits before the anchor
        let log = OperationLog::from_records(vec![
            effect_record(1, clip, 0, 1000, 0.0),
            split,
            effect_record(3, second, 0, 100, 50.0),
        ])
        .unwrap();

        let out = engine.render(&log, &base).unwrap();
        assert_eq!(out.anchor, Some(RecordId(2)));
        assert_eq!(out.replayed, vec![RecordId(3)]);
        assert!(out.orphaned.is_empty());
        let original = base.render();
        assert_eq!(out.buffer.sample(0, 10), original.sample(0, 10));
        assert_eq!(
            out.buffer.sample(0, 450),
            original.sample(0, 450).map(|s| s * 0.5)
        );
    }

    #[test]
    fn test_orphaned_record_is_skipped() {
        let engine = engine();
        let (base, _) = base(300);
        let log = OperationLog::from_records(vec![effect_record(1, ClipId(999), 0, 10, 0.0)]).unwrap();
        let out = engine.render(&log, &base).unwrap();
        assert_eq!(out.orphaned, vec![RecordId(1)]);
        assert_eq!(out.buffer, base.render());
    }

    #[test]
    fn test_registry_failure_fails_render() {
        let engine = engine();
        let (base, _) = base(300);
        let clip = base.graph().clips()[0].id;
        let log = OperationLog::from_records(vec![effect_record(1, clip, 0, 10, -5.0)]).unwrap();
        assert!(matches!(
            engine.render(&log, &base),
            Err(RenderError::Registry { record: RecordId(1), .. })
        ));
    }

    #[test]
    fn test_disabled_record_not_applied_and_cache_consistent() {
        let engine = engine();
        let (base, _) = base(400);
        let clip = base.graph().clips()[0].id;
        let mut log = OperationLog::from_records(vec![effect_record(1, clip, 0, 400, 50.0)]).unwrap();

        let on = engine.render(&log, &base).unwrap().buffer;
        log.toggle(RecordId(1)).unwrap();
        let off = engine.render(&log, &base).unwrap().buffer;
        log.toggle(RecordId(1)).unwrap();
        let on_again = engine.render(&log, &base).unwrap().buffer;

        assert_eq!(off, base.render());
        assert_eq!(on, on_again);
        assert!(engine.cache().stats().hits >= 1);
    }

    #[test]
    fn test_shared_engine_keeps_histories_apart() {
        let engine = engine();
        let (first, _) = base(300);
        let (second, _) = base(500);
        let clip = first.graph().clips()[0].id;
        assert_eq!(second.graph().clips()[0].id, clip);

        // Same record id and clip id in both histories
        let log = OperationLog::from_records(vec![effect_record(1, clip, 0, 100, 50.0)]).unwrap();
        let a = engine.render(&log, &first).unwrap().buffer;
        let b = engine.render(&log, &second).unwrap().buffer;
        let a_again = engine.render(&log, &first).unwrap().buffer;

        assert_eq!(a.len(), 300);
        assert_eq!(b.len(), 500);
        assert_eq!(a, a_again);
        assert_eq!(b.sample(0, 400), second.render().sample(0, 400));
    }

    #[test]
    fn test_render_until_prefix() {
        let engine = engine();
        let (base, _) = base(200);
        let clip = base.graph().clips()[0].id;
        let log = OperationLog::from_records(vec![
            effect_record(1, clip, 0, 200, 50.0),
            effect_record(2, clip, 0, 200, 50.0),
        ])
        .unwrap();
        let first = engine.render_until(&log, &base, 1).unwrap();
        assert_eq!(first.replayed, vec![RecordId(1)]);
        let full = engine.render(&log, &base).unwrap();
        assert_eq!(full.replayed.len(), 2);
        assert_ne!(first.buffer, full.buffer);
    }

    #[test]
    fn test_cancelled_render() {
        let engine = engine();
        let (base, _) = base(200);
        let clip = base.graph().clips()[0].id;
        let log = OperationLog::from_records(vec![effect_record(1, clip, 0, 200, 50.0)]).unwrap();
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            engine.render_with_cancel(&log, &base, &token).unwrap_err(),
            RenderError::Cancelled
        );
    }

    #[test]
    fn test_apply_structural_cut_splice() {
        let engine = engine();
        let (base, mut ids) = base(10_000);
        let clip = base.graph().clips()[0].id;
        let op = StructuralOp::Cut {
            target: ClipRegion::new(clip, 2000, 2000),
            mode: CutMode::Splice,
        };
        let next = engine.apply_structural(&base, &op, &mut ids).unwrap();
        assert_eq!(next.total_length(), 8000);
        assert_eq!(next.graph().len(), 2);
        // Input state untouched
        assert_eq!(base.total_length(), 10_000);
    }
}
