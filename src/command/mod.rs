// Command pattern for undo/redo
//
// Every user-visible song edit goes through an UndoableCommand so the
// manager can walk history in both directions. Commands capture whatever
// prior state their undo needs at execute time.

pub mod commands;
pub mod manager;
pub mod trait_def;

pub use manager::CommandManager;
pub use trait_def::{CommandError, CommandResult, UndoableCommand};
