// UndoableCommand trait definition

use crate::command::state::HistoryState;
use crate::history::HistoryError;

/// Result type for command operations
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors that can occur during command execution
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// The history rejected the mutation; state is unchanged
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Undo or redo requested with an empty stack
    #[error("Nothing to {0}")]
    UndoStackExhausted(&'static str),

    /// Undo operation failed
    #[error("Undo failed: {0}")]
    UndoFailed(String),
}

/// Trait for commands that support undo/redo
///
/// Every mutation of the operation log goes through this trait. A command
/// captures the full log before it runs and the log it produced, so undo
/// and redo restore exact log states rather than re-deriving them.
///
/// # Example
/// ```no_run
/// use glitch_history::command::trait_def::{UndoableCommand, CommandResult, CommandError};
/// use glitch_history::command::state::HistoryState;
/// use glitch_history::history::OperationLog;
///
/// struct ClearCommand {
///     before: Option<OperationLog>,
/// }
///
/// impl UndoableCommand for ClearCommand {
///     fn execute(&mut self, state: &mut HistoryState) -> CommandResult<()> {
///         self.before = Some(state.log.clone());
///         state.clear_log();
///         Ok(())
///     }
///
///     fn undo(&mut self, state: &mut HistoryState) -> CommandResult<()> {
///         let before = self
///             .before
///             .clone()
///             .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
///         state.restore_log(before);
///         Ok(())
///     }
///
///     fn description(&self) -> String {
///         "Clear History".to_string()
///     }
/// }
/// ```
pub trait UndoableCommand: Send {
    /// Execute the command
    ///
    /// Must leave `state` untouched when it returns an error.
    fn execute(&mut self, state: &mut HistoryState) -> CommandResult<()>;

    /// Undo the command
    ///
    /// Restores the log to what it was before execute() was called.
    fn undo(&mut self, state: &mut HistoryState) -> CommandResult<()>;

    /// Get a human-readable description of the command
    ///
    /// Used for UI display (e.g., "Undo: Apply Volume")
    fn description(&self) -> String;
}
