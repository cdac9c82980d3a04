// CommandManager - bounded undo/redo over history commands

use crate::command::state::HistoryState;
use crate::command::trait_def::{CommandError, CommandResult, UndoableCommand};
use std::collections::VecDeque;

/// Undo depth used when no configuration says otherwise
pub const DEFAULT_MAX_HISTORY: usize = 30;

type CommandStack = VecDeque<Box<dyn UndoableCommand>>;

/// Undo and redo stacks for one history
///
/// Each entry is one user action and carries two log snapshots. Executing a
/// new command drops the redo stack; past `max_history` entries the oldest
/// undo entry is discarded.
pub struct CommandManager {
    undo_stack: CommandStack,
    redo_stack: CommandStack,
    max_history: usize,
}

/// Which way a stack transfer goes
#[derive(Clone, Copy)]
enum Step {
    Undo,
    Redo,
}

impl Step {
    fn label(self) -> &'static str {
        match self {
            Step::Undo => "undo",
            Step::Redo => "redo",
        }
    }
}

impl CommandManager {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }

    pub fn with_capacity(max_history: usize) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(max_history),
            redo_stack: VecDeque::new(),
            max_history,
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Run `command` and push it onto the undo stack
    ///
    /// A failed command leaves both stacks untouched.
    pub fn execute(
        &mut self,
        mut command: Box<dyn UndoableCommand>,
        state: &mut HistoryState,
    ) -> CommandResult<()> {
        command.execute(state)?;
        log::debug!("Executed '{}'", command.description());

        self.redo_stack.clear();
        self.undo_stack.push_back(command);
        while self.undo_stack.len() > self.max_history {
            self.undo_stack.pop_front();
        }
        Ok(())
    }

    /// Revert the most recent command, returning its description
    pub fn undo(&mut self, state: &mut HistoryState) -> CommandResult<String> {
        self.step(Step::Undo, state)
    }

    /// Re-apply the most recently undone command, returning its description
    pub fn redo(&mut self, state: &mut HistoryState) -> CommandResult<String> {
        self.step(Step::Redo, state)
    }

    fn step(&mut self, step: Step, state: &mut HistoryState) -> CommandResult<String> {
        let (from, to) = match step {
            Step::Undo => (&mut self.undo_stack, &mut self.redo_stack),
            Step::Redo => (&mut self.redo_stack, &mut self.undo_stack),
        };
        let mut command = from
            .pop_back()
            .ok_or(CommandError::UndoStackExhausted(step.label()))?;

        let result = match step {
            Step::Undo => command.undo(state),
            Step::Redo => command.execute(state),
        };
        let description = command.description();
        if let Err(e) = result {
            // Keep the entry where it was so the user can retry
            from.push_back(command);
            return Err(e);
        }

        log::debug!("{} '{}'", step.label(), description);
        to.push_back(command);
        Ok(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|cmd| cmd.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|cmd| cmd.description())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}
