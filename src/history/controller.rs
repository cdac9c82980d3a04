// HistoryController - the mutation surface of the edit history
//
// Wraps HistoryState and the bounded undo/redo stacks. Every mutation is one
// undoable command; after each one the render cache drops entries the new
// log can no longer reach.

use crate::audio::buffer::SampleBuffer;
use crate::command::{
    AppendCommand, ClearCommand, CommandManager, CommandResult, DeleteCommand, HistoryState,
    ToggleCommand, UndoableCommand,
};
use crate::config::EngineConfig;
use crate::history::log::OperationLog;
use crate::history::record::{Operation, OperationKind, RecordId, RecordMeta, Scope, StructuralOp};
use crate::history::{HistoryError, HistoryResult};
use crate::render::engine::{RenderEngine, RenderOutput};
use crate::timeline::{ClipColor, ClipGraph, ClipIdAllocator, TimelineState};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use crate::command::state::DeleteMode;

/// What a delete would remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePreview {
    pub record: RecordId,
    /// Records removed, in log order (the record itself first)
    pub removed: Vec<RecordId>,
    /// Whether confirmation is required
    pub cascade: bool,
}

/// One row of the history panel
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub index: usize,
    pub id: RecordId,
    pub kind: OperationKind,
    pub name: String,
    pub scope: Scope,
    pub color: ClipColor,
    pub timestamp: DateTime<Utc>,
    pub enabled: bool,
    /// Baked into a later structural snapshot
    pub frozen: bool,
    pub structural: bool,
}

pub struct HistoryController {
    state: HistoryState,
    commands: CommandManager,
}

impl HistoryController {
    /// New history over `base`, engine and registry built from `config`
    pub fn new(base: SampleBuffer, config: &EngineConfig) -> Self {
        let engine = Arc::new(RenderEngine::new(
            Arc::new(config.registry()),
            config.render_settings(),
        ));
        let mut ids = ClipIdAllocator::default();
        let base = Arc::new(TimelineState::from_base(base, &mut ids));
        Self::from_state(HistoryState::new(base, ids, engine), config.undo_capacity)
    }

    /// Wrap an existing state (e.g. a loaded project)
    pub fn from_state(state: HistoryState, undo_capacity: usize) -> Self {
        Self {
            state,
            commands: CommandManager::with_capacity(undo_capacity),
        }
    }

    pub fn state(&self) -> &HistoryState {
        &self.state
    }

    pub fn log(&self) -> &OperationLog {
        &self.state.log
    }

    pub fn base(&self) -> &Arc<TimelineState> {
        &self.state.base
    }

    pub fn engine(&self) -> &Arc<RenderEngine> {
        self.state.engine()
    }

    pub fn into_state(self) -> HistoryState {
        self.state
    }

    /// Append `operation` with its default name
    pub fn append(&mut self, operation: Operation) -> CommandResult<RecordId> {
        let scope = match operation {
            Operation::Structural(StructuralOp::ClipReorder { .. }) => Scope::Global,
            _ => Scope::Local,
        };
        let meta = RecordMeta::new(operation.default_name(self.state.registry()))
            .with_scope(scope)
            .with_color(ClipColor::distinct(self.state.next_record as u32));
        self.append_with_meta(operation, meta)
    }

    pub fn append_with_meta(
        &mut self,
        operation: Operation,
        meta: RecordMeta,
    ) -> CommandResult<RecordId> {
        self.execute(Box::new(AppendCommand::new(operation, meta)))?;
        let id = self
            .state
            .log
            .last()
            .map(|r| r.id)
            .ok_or(HistoryError::EmptyContent)?;
        log::debug!("Appended record {}", id);
        Ok(id)
    }

    /// Flip a content record; returns the new `enabled` flag
    pub fn toggle(&mut self, id: RecordId) -> CommandResult<bool> {
        let name = self.state.log.require(id)?.meta.name.clone();
        self.execute(Box::new(ToggleCommand::new(id, name)))?;
        let enabled = self.state.log.require(id)?.is_enabled();
        log::debug!("Record {} is now {}", id, if enabled { "enabled" } else { "disabled" });
        Ok(enabled)
    }

    /// Delete a record; returns the ids removed
    pub fn delete(&mut self, id: RecordId, mode: DeleteMode) -> CommandResult<Vec<RecordId>> {
        let preview = self.preview_delete(id)?;
        if preview.cascade && mode == DeleteMode::Single {
            return Err(HistoryError::CascadeNotConfirmed {
                record: id,
                removed: preview.removed.len(),
            }
            .into());
        }
        let name = self.state.log.require(id)?.meta.name.clone();
        self.execute(Box::new(DeleteCommand::new(id, mode, name)))?;
        log::debug!("Deleted {} record(s) starting at {}", preview.removed.len(), id);
        Ok(preview.removed)
    }

    /// What `delete(id, ConfirmedCascade)` would remove
    pub fn preview_delete(&self, id: RecordId) -> HistoryResult<DeletePreview> {
        let record = self.state.log.require(id)?;
        let removed = if record.is_structural() {
            self.state.log.suffix_from(id)?.iter().map(|r| r.id).collect()
        } else {
            vec![id]
        };
        Ok(DeletePreview {
            record: id,
            removed,
            cascade: record.is_structural(),
        })
    }

    /// Empty the log back to the base timeline
    pub fn clear(&mut self) -> CommandResult<()> {
        self.execute(Box::new(ClearCommand::new()))
    }

    pub fn undo(&mut self) -> CommandResult<String> {
        let description = self.commands.undo(&mut self.state)?;
        self.after_mutation();
        Ok(description)
    }

    pub fn redo(&mut self) -> CommandResult<String> {
        let description = self.commands.redo(&mut self.state)?;
        self.after_mutation();
        Ok(description)
    }

    pub fn can_undo(&self) -> bool {
        self.commands.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.commands.can_redo()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.commands.undo_description()
    }

    pub fn redo_description(&self) -> Option<String> {
        self.commands.redo_description()
    }

    pub fn render(&self) -> HistoryResult<RenderOutput> {
        self.state.render()
    }

    /// Clip graph of the current render
    pub fn current_graph(&self) -> HistoryResult<ClipGraph> {
        Ok(self.render()?.state.graph().clone())
    }

    /// Rows for a history panel, in log order
    pub fn entries(&self) -> Vec<HistoryEntry> {
        let log = &self.state.log;
        let anchor_order = log.anchor().map(|a| a.created_order);
        log.iter()
            .enumerate()
            .map(|(index, record)| HistoryEntry {
                index,
                id: record.id,
                kind: record.kind(),
                name: record.meta.name.clone(),
                scope: record.meta.scope,
                color: record.meta.color,
                timestamp: record.meta.timestamp,
                enabled: record.is_enabled(),
                frozen: !record.is_structural()
                    && anchor_order.is_some_and(|order| record.created_order < order),
                structural: record.is_structural(),
            })
            .collect()
    }

    /// Content records whose clip no longer exists
    pub fn orphaned_records(&self) -> HistoryResult<Vec<RecordId>> {
        Ok(self.render()?.orphaned)
    }

    /// Render for export; refused while orphaned records exist
    pub fn export_render(&self) -> HistoryResult<SampleBuffer> {
        let output = self.render()?;
        if output.has_orphans() {
            return Err(HistoryError::OrphanedRecords(output.orphaned));
        }
        Ok(output.buffer)
    }

    fn execute(&mut self, command: Box<dyn UndoableCommand>) -> CommandResult<()> {
        self.commands.execute(command, &mut self.state)?;
        self.after_mutation();
        Ok(())
    }

    fn after_mutation(&self) {
        self.engine().cache().retain_reachable(&self.state.log);
    }
}

impl std::fmt::Debug for HistoryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryController")
            .field("state", &self.state)
            .field("undo", &self.commands.undo_count())
            .field("redo", &self.commands.redo_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandError;
    use crate::effect::EffectParams;
    use crate::timeline::{ClipRegion, CutMode};

    fn controller(len: usize) -> HistoryController {
        let base = SampleBuffer::from_mono((0..len).map(|i| (i % 100) as f32 / 100.0).collect(), 1000)
            .unwrap();
        HistoryController::new(base, &EngineConfig::default())
    }

    fn gain(ctrl: &HistoryController, gain: f64) -> Operation {
        let clip = ctrl.current_graph().unwrap().clips()[0].clone();
        Operation::effect(
            "volume",
            EffectParams::new().with("gain", gain),
            ClipRegion::whole(&clip),
        )
    }

    #[test]
    fn test_append_names_record() {
        let mut ctrl = controller(100);
        let id = ctrl.append(gain(&ctrl, 0.5)).unwrap();
        let entries = ctrl.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].name, "Apply Volume");
        assert!(entries[0].enabled);
        assert_eq!(ctrl.undo_description().as_deref(), Some("Apply Volume"));
    }

    #[test]
    fn test_toggle_structural_rejected() {
        let mut ctrl = controller(100);
        let clip = ctrl.current_graph().unwrap().clips()[0].id;
        let split = ctrl.append(Operation::split(clip, 50)).unwrap();
        let err = ctrl.toggle(split).unwrap_err();
        assert!(matches!(
            err,
            CommandError::History(HistoryError::NotToggleable { .. })
        ));
        assert_eq!(ctrl.commands.undo_count(), 1);
    }

    #[test]
    fn test_preview_and_unconfirmed_cascade() {
        let mut ctrl = controller(100);
        let a = ctrl.append(gain(&ctrl, 0.5)).unwrap();
        let clip = ctrl.current_graph().unwrap().clips()[0].id;
        let cut = ctrl
            .append(Operation::cut(ClipRegion::new(clip, 10, 20), CutMode::Silence))
            .unwrap();
        let b = ctrl.append(gain(&ctrl, 0.25)).unwrap();

        let preview = ctrl.preview_delete(cut).unwrap();
        assert!(preview.cascade);
        assert_eq!(preview.removed, vec![cut, b]);

        let err = ctrl.delete(cut, DeleteMode::Single).unwrap_err();
        assert_eq!(
            err,
            CommandError::History(HistoryError::CascadeNotConfirmed {
                record: cut,
                removed: 2
            })
        );
        assert_eq!(ctrl.log().len(), 3);

        ctrl.delete(cut, DeleteMode::ConfirmedCascade).unwrap();
        assert_eq!(ctrl.log().len(), 1);
        assert!(ctrl.log().contains(a));
    }

    #[test]
    fn test_frozen_entries() {
        let mut ctrl = controller(100);
        ctrl.append(gain(&ctrl, 0.5)).unwrap();
        let clip = ctrl.current_graph().unwrap().clips()[0].id;
        ctrl.append(Operation::split(clip, 40)).unwrap();
        let entries = ctrl.entries();
        assert!(entries[0].frozen);
        assert!(!entries[1].frozen);
        assert!(entries[1].structural);
    }

    #[test]
    fn test_undo_exhausted() {
        let mut ctrl = controller(10);
        assert_eq!(
            ctrl.undo().unwrap_err(),
            CommandError::UndoStackExhausted("undo")
        );
        assert!(!ctrl.can_redo());
    }

    #[test]
    fn test_clear_then_undo() {
        let mut ctrl = controller(100);
        ctrl.append(gain(&ctrl, 0.5)).unwrap();
        ctrl.clear().unwrap();
        assert!(ctrl.log().is_empty());
        assert_eq!(ctrl.render().unwrap().buffer, ctrl.base().render());
        ctrl.undo().unwrap();
        assert_eq!(ctrl.log().len(), 1);
    }
}
