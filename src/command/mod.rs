// Command Pattern for Undo/Redo functionality
//
// Every mutation of the operation log goes through an UndoableCommand so the
// bounded undo/redo stacks always see one entry per user action.
//
// Architecture:
// - UndoableCommand trait: Defines execute(), undo(), description()
// - CommandManager: Manages undo/redo stacks
// - HistoryState: the log, base timeline and allocators commands operate on
// - Concrete commands: AppendCommand, ToggleCommand, DeleteCommand, ClearCommand

pub mod commands;
pub mod manager;
pub mod state;
pub mod trait_def;

pub use commands::{AppendCommand, ClearCommand, DeleteCommand, ToggleCommand};
pub use manager::CommandManager;
pub use state::{DeleteMode, HistoryState};
pub use trait_def::{CommandError, CommandResult, UndoableCommand};
