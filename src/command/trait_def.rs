// UndoableCommand trait definition

use crate::sequencer::song::{Song, SongError};
use std::fmt;

/// Result type for command operations
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors that can occur during command execution
#[derive(Debug, Clone)]
pub enum CommandError {
    /// Command execution failed
    ExecutionFailed(String),
    /// Undo operation failed
    UndoFailed(String),
    /// The command references song state that no longer exists
    InvalidState(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::ExecutionFailed(msg) => write!(f, "Execution failed: {}", msg),
            CommandError::UndoFailed(msg) => write!(f, "Undo failed: {}", msg),
            CommandError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<SongError> for CommandError {
    fn from(err: SongError) -> Self {
        CommandError::ExecutionFailed(err.to_string())
    }
}

/// A reversible song edit
///
/// `execute` must leave enough state behind for `undo` to restore the song
/// exactly; `undo` before a successful `execute` is an error. Commands must
/// be `Send` so a history can migrate between threads.
pub trait UndoableCommand: Send {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()>;

    fn undo(&mut self, song: &mut Song) -> CommandResult<()>;

    /// Human-readable description, shown as "Undo: ..." / "Redo: ..."
    fn description(&self) -> String;
}
