// Concrete history commands
//
// Each command records the log before and after its first execution. Undo
// restores the "before" log, redo restores the "after" log, so a redo never
// re-allocates ids or re-renders snapshots.

use crate::command::state::{DeleteMode, HistoryState};
use crate::command::trait_def::{CommandError, CommandResult, UndoableCommand};
use crate::history::HistoryResult;
use crate::history::log::OperationLog;
use crate::history::record::{Operation, RecordId, RecordMeta};

/// Log states captured around one execution
#[derive(Debug, Default)]
struct LogTransition {
    before: Option<OperationLog>,
    after: Option<OperationLog>,
}

impl LogTransition {
    fn run<F>(&mut self, state: &mut HistoryState, mutate: F) -> CommandResult<()>
    where
        F: FnOnce(&mut HistoryState) -> HistoryResult<()>,
    {
        if let Some(after) = &self.after {
            state.restore_log(after.clone());
            return Ok(());
        }
        let before = state.log.clone();
        mutate(state)?;
        self.before = Some(before);
        self.after = Some(state.log.clone());
        Ok(())
    }

    fn revert(&self, state: &mut HistoryState) -> CommandResult<()> {
        let before = self
            .before
            .clone()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        state.restore_log(before);
        Ok(())
    }
}

/// Append a new operation record
pub struct AppendCommand {
    operation: Operation,
    meta: RecordMeta,
    transition: LogTransition,
}

impl AppendCommand {
    pub fn new(operation: Operation, meta: RecordMeta) -> Self {
        Self {
            operation,
            meta,
            transition: LogTransition::default(),
        }
    }
}

impl UndoableCommand for AppendCommand {
    fn execute(&mut self, state: &mut HistoryState) -> CommandResult<()> {
        let operation = &self.operation;
        let meta = &self.meta;
        self.transition.run(state, |state| {
            state
                .append_record(operation.clone(), meta.clone())
                .map(|_| ())
        })
    }

    fn undo(&mut self, state: &mut HistoryState) -> CommandResult<()> {
        self.transition.revert(state)
    }

    fn description(&self) -> String {
        self.meta.name.clone()
    }
}

/// Flip `enabled` on a content record
pub struct ToggleCommand {
    record: RecordId,
    name: String,
    enabled_after: Option<bool>,
    transition: LogTransition,
}

impl ToggleCommand {
    pub fn new(record: RecordId, name: impl Into<String>) -> Self {
        Self {
            record,
            name: name.into(),
            enabled_after: None,
            transition: LogTransition::default(),
        }
    }
}

impl UndoableCommand for ToggleCommand {
    fn execute(&mut self, state: &mut HistoryState) -> CommandResult<()> {
        let record = self.record;
        let enabled_after = &mut self.enabled_after;
        self.transition.run(state, |state| {
            *enabled_after = Some(state.toggle_record(record)?);
            Ok(())
        })
    }

    fn undo(&mut self, state: &mut HistoryState) -> CommandResult<()> {
        self.transition.revert(state)
    }

    fn description(&self) -> String {
        match self.enabled_after {
            Some(false) => format!("Disable {}", self.name),
            _ => format!("Enable {}", self.name),
        }
    }
}

/// Delete a record, cascading over later records when confirmed
pub struct DeleteCommand {
    record: RecordId,
    mode: DeleteMode,
    name: String,
    removed: usize,
    transition: LogTransition,
}

impl DeleteCommand {
    pub fn new(record: RecordId, mode: DeleteMode, name: impl Into<String>) -> Self {
        Self {
            record,
            mode,
            name: name.into(),
            removed: 0,
            transition: LogTransition::default(),
        }
    }
}

impl UndoableCommand for DeleteCommand {
    fn execute(&mut self, state: &mut HistoryState) -> CommandResult<()> {
        let (record, mode) = (self.record, self.mode);
        let removed = &mut self.removed;
        self.transition.run(state, |state| {
            *removed = state.delete_record(record, mode)?.len();
            Ok(())
        })
    }

    fn undo(&mut self, state: &mut HistoryState) -> CommandResult<()> {
        self.transition.revert(state)
    }

    fn description(&self) -> String {
        if self.removed > 1 {
            format!("Delete {} (+{} later)", self.name, self.removed - 1)
        } else {
            format!("Delete {}", self.name)
        }
    }
}

/// Empty the log
#[derive(Default)]
pub struct ClearCommand {
    transition: LogTransition,
}

impl ClearCommand {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UndoableCommand for ClearCommand {
    fn execute(&mut self, state: &mut HistoryState) -> CommandResult<()> {
        self.transition.run(state, |state| {
            state.clear_log();
            Ok(())
        })
    }

    fn undo(&mut self, state: &mut HistoryState) -> CommandResult<()> {
        self.transition.revert(state)
    }

    fn description(&self) -> String {
        "Clear History".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::SampleBuffer;
    use crate::effect::{EffectParams, EffectRegistry};
    use crate::render::engine::{RenderEngine, RenderSettings};
    use crate::timeline::{ClipIdAllocator, ClipRegion, TimelineState};
    use std::sync::Arc;

    fn test_state() -> HistoryState {
        let engine = Arc::new(RenderEngine::new(
            Arc::new(EffectRegistry::with_builtins()),
            RenderSettings::default(),
        ));
        let mut ids = ClipIdAllocator::default();
        let base = SampleBuffer::from_mono(vec![0.5; 64], 1000).unwrap();
        let base = Arc::new(TimelineState::from_base(base, &mut ids));
        HistoryState::new(base, ids, engine)
    }

    fn volume(state: &HistoryState) -> Operation {
        let clip = state.base.graph().clips()[0].id;
        Operation::effect(
            "volume",
            EffectParams::new().with("gain_pct", 50.0),
            ClipRegion::new(clip, 0, 64),
        )
    }

    #[test]
    fn test_append_undo_redo_restores_exact_logs() {
        let mut state = test_state();
        let mut cmd = AppendCommand::new(volume(&state), RecordMeta::new("Apply Volume"));

        cmd.execute(&mut state).unwrap();
        let after = state.log.clone();
        cmd.undo(&mut state).unwrap();
        assert!(state.log.is_empty());
        cmd.execute(&mut state).unwrap();

        assert_eq!(state.log, after);
        // Redo reuses the original record, no new id is allocated
        assert_eq!(state.next_record, 2);
    }

    #[test]
    fn test_failed_command_leaves_state() {
        let mut state = test_state();
        let mut cmd = ToggleCommand::new(RecordId(42), "Nothing");
        assert!(cmd.execute(&mut state).is_err());
        assert!(cmd.undo(&mut state).is_err());
    }

    #[test]
    fn test_toggle_description() {
        let mut state = test_state();
        AppendCommand::new(volume(&state), RecordMeta::new("Apply Volume"))
            .execute(&mut state)
            .unwrap();
        let mut cmd = ToggleCommand::new(RecordId(1), "Apply Volume");
        cmd.execute(&mut state).unwrap();
        assert_eq!(cmd.description(), "Disable Apply Volume");
    }

    #[test]
    fn test_clear_and_undo() {
        let mut state = test_state();
        AppendCommand::new(volume(&state), RecordMeta::new("Apply Volume"))
            .execute(&mut state)
            .unwrap();
        let mut clear = ClearCommand::new();
        clear.execute(&mut state).unwrap();
        assert!(state.log.is_empty());
        clear.undo(&mut state).unwrap();
        assert_eq!(state.log.len(), 1);
    }
}
