// CommandManager - undo/redo stacks

use crate::command::trait_def::{CommandError, CommandResult, UndoableCommand};
use crate::sequencer::song::Song;
use std::collections::VecDeque;

/// Default maximum number of commands kept in history
const DEFAULT_MAX_HISTORY: usize = 100;

/// Executes commands and maintains the undo/redo stacks
///
/// Executing a new command clears the redo stack. History is capped at
/// `max_history` entries; the oldest command is dropped past the cap.
pub struct CommandManager {
    /// Commands that can be undone, most recent at the back
    undo_stack: VecDeque<Box<dyn UndoableCommand>>,

    /// Commands that can be redone, most recent at the back
    redo_stack: VecDeque<Box<dyn UndoableCommand>>,

    max_history: usize,
}

impl CommandManager {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_HISTORY)
    }

    pub fn with_capacity(max_history: usize) -> Self {
        Self {
            undo_stack: VecDeque::with_capacity(max_history),
            redo_stack: VecDeque::with_capacity(max_history),
            max_history,
        }
    }

    /// Execute a command and push it onto the undo stack
    ///
    /// A command that fails to execute leaves both stacks untouched.
    pub fn execute(
        &mut self,
        mut command: Box<dyn UndoableCommand>,
        song: &mut Song,
    ) -> CommandResult<()> {
        command.execute(song)?;

        self.undo_stack.push_back(command);
        self.redo_stack.clear();

        if self.undo_stack.len() > self.max_history {
            self.undo_stack.pop_front();
        }

        Ok(())
    }

    /// Undo the most recent command, returning its description
    pub fn undo(&mut self, song: &mut Song) -> CommandResult<String> {
        let mut command = self
            .undo_stack
            .pop_back()
            .ok_or_else(|| CommandError::UndoFailed("Nothing to undo".into()))?;

        let description = command.description();
        command.undo(song)?;
        self.redo_stack.push_back(command);

        Ok(description)
    }

    /// Re-execute the most recently undone command
    pub fn redo(&mut self, song: &mut Song) -> CommandResult<String> {
        let mut command = self
            .redo_stack
            .pop_back()
            .ok_or_else(|| CommandError::ExecutionFailed("Nothing to redo".into()))?;

        let description = command.description();
        command.execute(song)?;
        self.undo_stack.push_back(command);

        Ok(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Description of the command that would be undone next
    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|cmd| cmd.description())
    }

    /// Description of the command that would be redone next
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

#[cfg(test)]
mod tests {
    use super::*;

    struct RenameCommand {
        title: String,
        old_title: Option<String>,
    }

    impl RenameCommand {
        fn new(title: &str) -> Self {
            Self {
                title: title.to_string(),
                old_title: None,
            }
        }
    }

    impl UndoableCommand for RenameCommand {
        fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
            self.old_title = Some(song.title().to_string());
            song.set_title(&self.title);
            Ok(())
        }

        fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
            let old = self
                .old_title
                .take()
                .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
            song.set_title(&old);
            Ok(())
        }

        fn description(&self) -> String {
            format!("Rename song to '{}'", self.title)
        }
    }

    fn test_song() -> Song {
        Song::new(16, 48000)
    }

    #[test]
    fn test_execute_pushes_undo() {
        let mut manager = CommandManager::new();
        let mut song = test_song();

        manager
            .execute(Box::new(RenameCommand::new("A")), &mut song)
            .unwrap();

        assert_eq!(song.title(), "A");
        assert_eq!(manager.undo_count(), 1);
        assert!(manager.can_undo());
        assert!(!manager.can_redo());
    }

    #[test]
    fn test_undo_restores_and_moves_to_redo() {
        let mut manager = CommandManager::new();
        let mut song = test_song();

        manager
            .execute(Box::new(RenameCommand::new("A")), &mut song)
            .unwrap();
        let description = manager.undo(&mut song).unwrap();

        assert_eq!(description, "Rename song to 'A'");
        assert_eq!(song.title(), "Untitled");
        assert_eq!(manager.undo_count(), 0);
        assert_eq!(manager.redo_count(), 1);
    }

    #[test]
    fn test_redo_reapplies() {
        let mut manager = CommandManager::new();
        let mut song = test_song();

        manager
            .execute(Box::new(RenameCommand::new("A")), &mut song)
            .unwrap();
        manager.undo(&mut song).unwrap();
        manager.redo(&mut song).unwrap();

        assert_eq!(song.title(), "A");
        assert_eq!(manager.undo_count(), 1);
        assert_eq!(manager.redo_count(), 0);
    }

    #[test]
    fn test_new_command_clears_redo() {
        let mut manager = CommandManager::new();
        let mut song = test_song();

        manager
            .execute(Box::new(RenameCommand::new("A")), &mut song)
            .unwrap();
        manager.undo(&mut song).unwrap();
        manager
            .execute(Box::new(RenameCommand::new("B")), &mut song)
            .unwrap();

        assert!(!manager.can_redo());
        assert_eq!(song.title(), "B");
    }

    #[test]
    fn test_history_cap_drops_oldest() {
        let mut manager = CommandManager::with_capacity(3);
        let mut song = test_song();

        for i in 0..5 {
            manager
                .execute(Box::new(RenameCommand::new(&format!("T{}", i))), &mut song)
                .unwrap();
        }

        assert_eq!(manager.undo_count(), 3);
    }

    #[test]
    fn test_empty_stacks_error() {
        let mut manager = CommandManager::new();
        let mut song = test_song();

        assert!(manager.undo(&mut song).is_err());
        assert!(manager.redo(&mut song).is_err());
    }

    #[test]
    fn test_descriptions_peek() {
        let mut manager = CommandManager::new();
        let mut song = test_song();

        assert!(manager.undo_description().is_none());
        manager
            .execute(Box::new(RenameCommand::new("A")), &mut song)
            .unwrap();
        assert_eq!(
            manager.undo_description().as_deref(),
            Some("Rename song to 'A'")
        );
    }
}
