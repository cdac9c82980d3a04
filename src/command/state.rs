// HistoryState - Centralized mutable state for the edit history
//
// This struct holds everything history commands modify: the operation log,
// the project's base timeline and the id/order allocators. Allocators are
// never rolled back by undo, so an id handed out once is never handed out
// again.

use crate::effect::EffectRegistry;
use crate::history::log::OperationLog;
use crate::history::record::{
    ContentOp, Operation, OperationRecord, RecordBody, RecordId, RecordMeta, StructuralOp,
};
use crate::history::{HistoryError, HistoryResult};
use crate::render::engine::{RenderEngine, RenderOutput};
use crate::timeline::{ClipIdAllocator, TimelineState};
use std::sync::Arc;

/// How a delete treats structural records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Content records only; a structural record is refused
    Single,
    /// Remove the record and everything after it (user confirmed)
    ConfirmedCascade,
}

/// Central state of the history that commands modify
pub struct HistoryState {
    /// The operation log
    pub log: OperationLog,

    /// Initial timeline (base buffer + initial clip graph)
    pub base: Arc<TimelineState>,

    /// Clip id source shared by every structural operation
    pub clip_ids: ClipIdAllocator,

    /// Next record id
    pub next_record: u64,

    /// Next created_order value
    pub next_order: u64,

    engine: Arc<RenderEngine>,
}

impl HistoryState {
    /// Fresh history over `base`
    pub fn new(base: Arc<TimelineState>, clip_ids: ClipIdAllocator, engine: Arc<RenderEngine>) -> Self {
        Self {
            log: OperationLog::new(),
            base,
            clip_ids,
            next_record: 1,
            next_order: 1,
            engine,
        }
    }

    /// Reassemble a persisted history
    ///
    /// Counters are raised past the log's maxima if needed.
    pub fn from_parts(
        base: Arc<TimelineState>,
        log: OperationLog,
        clip_ids: ClipIdAllocator,
        next_record: u64,
        next_order: u64,
        engine: Arc<RenderEngine>,
    ) -> Self {
        let min_record = log.max_record_id().map_or(1, |id| id.0 + 1);
        let min_order = log.max_created_order().map_or(1, |o| o + 1);
        Self {
            log,
            base,
            clip_ids,
            next_record: next_record.max(min_record),
            next_order: next_order.max(min_order),
            engine,
        }
    }

    pub fn engine(&self) -> &Arc<RenderEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &EffectRegistry {
        self.engine.registry()
    }

    /// Render the current log
    pub fn render(&self) -> HistoryResult<RenderOutput> {
        Ok(self.engine.render(&self.log, &self.base)?)
    }

    /// Validate `operation` against the current timeline and append it
    ///
    /// Nothing is committed (log, allocators) unless every check passes.
    pub fn append_record(&mut self, operation: Operation, meta: RecordMeta) -> HistoryResult<RecordId> {
        let tip = self.render()?;

        let body = match operation {
            Operation::Content(op) => RecordBody::Content {
                op: self.prepare_content(op, &tip.state)?,
                enabled: true,
            },
            Operation::Structural(op) => {
                self.check_structural(&op)?;
                let mut ids = self.clip_ids;
                let snapshot = self.engine.apply_structural(&tip.state, &op, &mut ids)?;
                self.clip_ids = ids;
                RecordBody::Structural {
                    op,
                    snapshot: Arc::new(snapshot),
                }
            }
        };

        let record = OperationRecord {
            id: RecordId(self.next_record),
            created_order: self.next_order,
            body,
            meta,
        };
        let id = record.id;
        self.log.push(record)?;
        self.next_record += 1;
        self.next_order += 1;
        Ok(id)
    }

    /// Check a content op's target and stamp it with the clip's current length
    fn prepare_content(&self, mut op: ContentOp, tip: &TimelineState) -> HistoryResult<ContentOp> {
        if !self.registry().contains(op.effect_id()) {
            return Err(HistoryError::UnknownEffect(op.effect_id().to_string()));
        }
        let target = *op.target();
        let clip = tip.graph().require(target.clip)?;
        target.validate_against(clip)?;
        *op.target_mut() = target.stamped(clip);
        Ok(op)
    }

    fn check_structural(&self, op: &StructuralOp) -> HistoryResult<()> {
        match op {
            StructuralOp::ClipAdd { content, .. } | StructuralOp::Recording { content, .. }
                if content.is_empty() =>
            {
                Err(HistoryError::EmptyContent)
            }
            _ => Ok(()),
        }
    }

    pub fn toggle_record(&mut self, id: RecordId) -> HistoryResult<bool> {
        self.log.toggle(id)
    }

    /// Remove a record; returns the removed records in log order
    pub fn delete_record(&mut self, id: RecordId, mode: DeleteMode) -> HistoryResult<Vec<OperationRecord>> {
        let record = self.log.require(id)?;
        if !record.is_structural() {
            return Ok(vec![self.log.remove_content(id)?]);
        }
        match mode {
            DeleteMode::ConfirmedCascade => self.log.truncate_from(id),
            DeleteMode::Single => Err(HistoryError::CascadeNotConfirmed {
                record: id,
                removed: self.log.suffix_from(id)?.len(),
            }),
        }
    }

    /// Empty the log, returning to the base timeline
    pub fn clear_log(&mut self) -> Vec<OperationRecord> {
        self.log.clear()
    }

    /// Replace the log wholesale (undo/redo)
    pub fn restore_log(&mut self, log: OperationLog) {
        self.log = log;
    }
}

impl std::fmt::Debug for HistoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryState")
            .field("records", &self.log.len())
            .field("next_record", &self.next_record)
            .field("next_order", &self.next_order)
            .field("clip_ids", &self.clip_ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::SampleBuffer;
    use crate::effect::EffectParams;
    use crate::render::engine::RenderSettings;
    use crate::timeline::{ClipId, ClipRegion};

    fn test_state(len: usize) -> HistoryState {
        let engine = Arc::new(RenderEngine::new(
            Arc::new(EffectRegistry::with_builtins()),
            RenderSettings::default(),
        ));
        let mut ids = ClipIdAllocator::default();
        let base = SampleBuffer::from_mono(vec![0.5; len], 1000).unwrap();
        let base = Arc::new(TimelineState::from_base(base, &mut ids));
        HistoryState::new(base, ids, engine)
    }

    fn first_clip(state: &HistoryState) -> ClipId {
        state.base.graph().clips()[0].id
    }

    #[test]
    fn test_append_stamps_target() {
        let mut state = test_state(100);
        let clip = first_clip(&state);
        let id = state
            .append_record(
                Operation::effect("volume", EffectParams::new(), ClipRegion::new(clip, 10, 20)),
                RecordMeta::new("Apply Volume"),
            )
            .unwrap();
        let record = state.log.get(id).unwrap();
        assert_eq!(record.content().unwrap().target().clip_length, 100);
        assert_eq!(state.next_record, 2);
    }

    #[test]
    fn test_invalid_region_leaves_log_unchanged() {
        let mut state = test_state(100);
        let clip = first_clip(&state);
        let err = state
            .append_record(
                Operation::effect("volume", EffectParams::new(), ClipRegion::new(clip, 90, 20)),
                RecordMeta::new("Apply Volume"),
            )
            .unwrap_err();
        assert!(matches!(err, HistoryError::InvalidRegion(_)));
        assert!(state.log.is_empty());
        assert_eq!(state.next_record, 1);
    }

    #[test]
    fn test_failed_structural_keeps_allocator() {
        let mut state = test_state(100);
        let before = state.clip_ids;
        let err = state
            .append_record(
                Operation::delete_clip(first_clip(&state)),
                RecordMeta::new("Delete"),
            )
            .unwrap_err();
        assert_eq!(err, HistoryError::LastClipDeletion);
        assert_eq!(state.clip_ids, before);
    }

    #[test]
    fn test_unknown_effect_rejected() {
        let mut state = test_state(100);
        let clip = first_clip(&state);
        let err = state
            .append_record(
                Operation::effect("nope", EffectParams::new(), ClipRegion::new(clip, 0, 10)),
                RecordMeta::new("Apply nope"),
            )
            .unwrap_err();
        assert_eq!(err, HistoryError::UnknownEffect("nope".into()));
    }

    #[test]
    fn test_from_parts_raises_counters() {
        let mut state = test_state(100);
        let clip = first_clip(&state);
        state
            .append_record(
                Operation::effect("volume", EffectParams::new(), ClipRegion::new(clip, 0, 10)),
                RecordMeta::new("Apply Volume"),
            )
            .unwrap();
        let rebuilt = HistoryState::from_parts(
            Arc::clone(&state.base),
            state.log.clone(),
            state.clip_ids,
            0,
            0,
            Arc::clone(state.engine()),
        );
        assert_eq!(rebuilt.next_record, 2);
        assert_eq!(rebuilt.next_order, 2);
    }
}
