// Note representation for patterns
// A note lives on the pattern grid: a step column, a MIDI key row

use serde::{Deserialize, Serialize};

/// A note in a pattern grid
///
/// Identity within a pattern is the (step, key) pair; a pattern never holds
/// two notes starting on the same step and key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Grid column the note starts on
    pub step: u32,

    /// MIDI key number (0-127, where 60 = C4)
    pub key: u8,

    /// MIDI velocity (1-127)
    pub velocity: u8,

    /// Length in steps (>= 1)
    pub length: u32,
}

impl Note {
    /// Creates a new note
    pub fn new(step: u32, key: u8, velocity: u8, length: u32) -> Self {
        assert!(key <= 127, "MIDI key must be 0-127");
        assert!(
            (1..=127).contains(&velocity),
            "MIDI velocity must be 1-127"
        );
        assert!(length >= 1, "Note length must be >= 1 step");

        Self {
            step,
            key,
            velocity,
            length,
        }
    }

    /// First step after the note ends
    pub fn end_step(&self) -> u32 {
        self.step + self.length
    }

    /// Check if the note is sounding on a given step
    pub fn covers_step(&self, step: u32) -> bool {
        step >= self.step && step < self.end_step()
    }

    /// The key name (e.g. "C4", "A#5")
    pub fn key_name(&self) -> String {
        const KEY_NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];

        let octave = (self.key / 12) as i32 - 1;
        let index = (self.key % 12) as usize;

        format!("{}{}", KEY_NAMES[index], octave)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_creation() {
        let note = Note::new(4, 60, 100, 2);

        assert_eq!(note.step, 4);
        assert_eq!(note.key, 60);
        assert_eq!(note.velocity, 100);
        assert_eq!(note.length, 2);
    }

    #[test]
    fn test_end_step_and_cover() {
        let note = Note::new(4, 60, 100, 3);

        assert_eq!(note.end_step(), 7);
        assert!(!note.covers_step(3));
        assert!(note.covers_step(4));
        assert!(note.covers_step(6));
        assert!(!note.covers_step(7));
    }

    #[test]
    fn test_key_name() {
        assert_eq!(Note::new(0, 60, 100, 1).key_name(), "C4");
        assert_eq!(Note::new(0, 69, 100, 1).key_name(), "A4");
        assert_eq!(Note::new(0, 73, 100, 1).key_name(), "C#5");
        assert_eq!(Note::new(0, 0, 100, 1).key_name(), "C-1");
    }

    #[test]
    #[should_panic(expected = "MIDI key must be 0-127")]
    fn test_invalid_key() {
        Note::new(0, 128, 100, 1);
    }

    #[test]
    #[should_panic(expected = "MIDI velocity must be 1-127")]
    fn test_invalid_velocity() {
        Note::new(0, 60, 0, 1);
    }

    #[test]
    #[should_panic(expected = "Note length must be >= 1 step")]
    fn test_zero_length() {
        Note::new(0, 60, 100, 0);
    }
}
