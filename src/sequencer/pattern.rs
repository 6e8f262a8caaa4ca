// Pattern - a fixed-size grid of steps x keys holding notes and curves
// Patterns are reusable: a track's sequence places them on the timeline

use crate::sequencer::curve::{ControllerInfo, Curve};
use crate::sequencer::note::Note;
use crate::sequencer::song::SongError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pattern identifier, unique within its track
pub type PatternId = u32;

/// A pattern: notes and controller curves on a step grid
///
/// The grid is `length * steps_per_beat` columns wide and 128 keys tall.
/// Notes never overlap on a key; adding a note trims its neighbors the way
/// an interactive editor expects (see [`Pattern::add_note`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Unique identifier within the owning track
    pub id: PatternId,

    name: String,

    /// Length in beats
    length: u32,

    /// Grid columns per beat
    steps_per_beat: u32,

    /// Notes sorted by (step, key)
    notes: Vec<Note>,

    /// Controller curves keyed by controller number
    curves: BTreeMap<u32, Curve>,
}

impl Pattern {
    /// Create a new empty pattern
    pub fn new(id: PatternId, name: &str, length: u32, steps_per_beat: u32) -> Self {
        assert!(length >= 1, "Pattern length must be at least 1 beat");
        assert!(steps_per_beat >= 1, "Pattern must have at least 1 step per beat");

        Self {
            id,
            name: name.to_string(),
            length,
            steps_per_beat,
            notes: Vec::new(),
            curves: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Length in beats
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Grid columns per beat
    pub fn steps_per_beat(&self) -> u32 {
        self.steps_per_beat
    }

    /// Total grid columns
    pub fn total_steps(&self) -> u32 {
        self.length * self.steps_per_beat
    }

    /// All notes, sorted by (step, key)
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Add a note to the grid
    ///
    /// The new note is trimmed so it neither runs past the pattern end nor
    /// into the next note on the same key; an earlier note on the same key
    /// that overlaps the new start is truncated to end there. A note already
    /// starting on (step, key) is replaced. Returns the note as stored.
    pub fn add_note(
        &mut self,
        step: u32,
        key: u8,
        velocity: u8,
        length: u32,
    ) -> Result<Note, SongError> {
        if step >= self.total_steps() || key > 127 {
            return Err(SongError::NoteOutOfRange { step, key });
        }
        if !(1..=127).contains(&velocity) {
            return Err(SongError::InvalidVelocity(velocity));
        }
        if length == 0 {
            return Err(SongError::InvalidNoteLength(length));
        }

        // Replace a note already starting here
        self.notes
            .retain(|n| !(n.step == step && n.key == key));

        // Truncate an earlier note on the same key overlapping the new start
        for n in self.notes.iter_mut() {
            if n.key == key && n.step < step && n.end_step() > step {
                n.length = step - n.step;
            }
        }

        // Clamp against the pattern end and the next note on the same key
        let mut max_end = self.total_steps();
        if let Some(next_start) = self
            .notes
            .iter()
            .filter(|n| n.key == key && n.step > step)
            .map(|n| n.step)
            .min()
        {
            max_end = max_end.min(next_start);
        }
        let length = length.min(max_end - step);

        let note = Note::new(step, key, velocity, length);
        let index = self
            .notes
            .binary_search_by(|n| (n.step, n.key).cmp(&(step, key)))
            .unwrap_or_else(|i| i);
        self.notes.insert(index, note);

        Ok(note)
    }

    /// Remove the note on `key` sounding at `step`, returning it
    pub fn delete_note(&mut self, step: u32, key: u8) -> Result<Note, SongError> {
        let index = self
            .notes
            .iter()
            .position(|n| n.key == key && n.covers_step(step))
            .ok_or(SongError::NoSuchNote { step, key })?;
        Ok(self.notes.remove(index))
    }

    /// The note on `key` sounding at `step`, if any
    pub fn note_at(&self, step: u32, key: u8) -> Option<&Note> {
        self.notes.iter().find(|n| n.key == key && n.covers_step(step))
    }

    /// Resize the note on `key` at `step`; the stored length is clamped the
    /// same way as in [`Pattern::add_note`]. Returns the length as stored.
    pub fn set_note_length(&mut self, step: u32, key: u8, length: u32) -> Result<u32, SongError> {
        if length == 0 {
            return Err(SongError::InvalidNoteLength(length));
        }

        let index = self
            .notes
            .iter()
            .position(|n| n.key == key && n.covers_step(step))
            .ok_or(SongError::NoSuchNote { step, key })?;
        let start = self.notes[index].step;

        let mut max_end = self.total_steps();
        if let Some(next_start) = self
            .notes
            .iter()
            .filter(|n| n.key == key && n.step > start)
            .map(|n| n.step)
            .min()
        {
            max_end = max_end.min(next_start);
        }
        let length = length.min(max_end - start);

        self.notes[index].length = length;
        Ok(length)
    }

    /// Change the velocity of the note on `key` sounding at `step`
    pub fn set_note_velocity(&mut self, step: u32, key: u8, velocity: u8) -> Result<(), SongError> {
        if !(1..=127).contains(&velocity) {
            return Err(SongError::InvalidVelocity(velocity));
        }

        let note = self
            .notes
            .iter_mut()
            .find(|n| n.key == key && n.covers_step(step))
            .ok_or(SongError::NoSuchNote { step, key })?;
        note.velocity = velocity;

        Ok(())
    }

    /// Notes starting in the half-open step range
    pub fn notes_starting_in(&self, start: u32, end: u32) -> impl Iterator<Item = &Note> {
        self.notes
            .iter()
            .filter(move |n| n.step >= start && n.step < end)
    }

    /// Change the pattern length in beats
    ///
    /// Notes starting beyond the new end are dropped, notes running past it
    /// are clamped, and curves are resized.
    pub fn set_length(&mut self, length: u32) {
        assert!(length >= 1, "Pattern length must be at least 1 beat");
        self.length = length;
        self.truncate_to_grid();
    }

    /// Change the grid resolution
    ///
    /// Note step indices are kept as-is; notes falling outside the new grid
    /// are dropped.
    pub fn set_steps_per_beat(&mut self, steps_per_beat: u32) {
        assert!(steps_per_beat >= 1, "Pattern must have at least 1 step per beat");
        self.steps_per_beat = steps_per_beat;
        self.truncate_to_grid();
    }

    fn truncate_to_grid(&mut self) {
        let total = self.total_steps();
        self.notes.retain(|n| n.step < total);
        for n in self.notes.iter_mut() {
            n.length = n.length.min(total - n.step);
        }
        for curve in self.curves.values_mut() {
            curve.resize(total);
        }
    }

    /// The curve for a controller number, if the pattern carries one
    pub fn curve(&self, number: u32) -> Option<&Curve> {
        self.curves.get(&number)
    }

    /// All curves, keyed by controller number
    pub fn curves(&self) -> impl Iterator<Item = &Curve> {
        self.curves.values()
    }

    /// Attach an empty curve for a controller (called when the owning track
    /// gains the controller)
    pub(crate) fn insert_curve(&mut self, info: ControllerInfo) {
        let number = info.number;
        let steps = self.total_steps();
        self.curves
            .entry(number)
            .or_insert_with(|| Curve::new(info, steps));
    }

    /// Detach the curve for a controller, returning it
    pub(crate) fn take_curve(&mut self, number: u32) -> Option<Curve> {
        self.curves.remove(&number)
    }

    /// Put back a previously captured note list (undo support)
    pub(crate) fn restore_notes(&mut self, notes: Vec<Note>) {
        self.notes = notes;
    }

    /// Re-key and update a curve after its controller was edited
    pub(crate) fn rekey_curve(&mut self, old_number: u32, info: ControllerInfo) {
        if let Some(mut curve) = self.curves.remove(&old_number) {
            let number = info.number;
            curve.set_info(info);
            self.curves.insert(number, curve);
        }
    }

    /// Add a curve point for a controller
    pub fn add_curve_point(&mut self, number: u32, step: u32, value: i32) -> Result<(), SongError> {
        let curve = self
            .curves
            .get_mut(&number)
            .ok_or(SongError::NoSuchController(number))?;
        if !curve.add_point(step, value) {
            return Err(SongError::StepOutOfRange(step));
        }
        Ok(())
    }

    /// Remove a curve point, returning its value
    pub fn remove_curve_point(&mut self, number: u32, step: u32) -> Result<i32, SongError> {
        let curve = self
            .curves
            .get_mut(&number)
            .ok_or(SongError::NoSuchController(number))?;
        curve
            .remove_point(step)
            .ok_or(SongError::NoSuchCurvePoint { number, step })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> Pattern {
        // 4 beats x 4 steps per beat = 16 columns
        Pattern::new(1, "Test", 4, 4)
    }

    #[test]
    fn test_pattern_creation() {
        let p = pattern();
        assert_eq!(p.id, 1);
        assert_eq!(p.name(), "Test");
        assert_eq!(p.length(), 4);
        assert_eq!(p.total_steps(), 16);
        assert!(p.is_empty());
    }

    #[test]
    fn test_add_note() {
        let mut p = pattern();
        let note = p.add_note(0, 60, 100, 4).unwrap();

        assert_eq!(note.length, 4);
        assert_eq!(p.note_count(), 1);
    }

    #[test]
    fn test_add_note_out_of_range() {
        let mut p = pattern();

        assert!(matches!(
            p.add_note(16, 60, 100, 1),
            Err(SongError::NoteOutOfRange { .. })
        ));
        assert!(matches!(
            p.add_note(0, 60, 0, 1),
            Err(SongError::InvalidVelocity(0))
        ));
        assert!(matches!(
            p.add_note(0, 60, 100, 0),
            Err(SongError::InvalidNoteLength(0))
        ));
    }

    #[test]
    fn test_note_clamped_to_pattern_end() {
        let mut p = pattern();
        let note = p.add_note(14, 60, 100, 8).unwrap();
        assert_eq!(note.length, 2);
    }

    #[test]
    fn test_add_note_truncates_earlier_note() {
        let mut p = pattern();
        p.add_note(0, 60, 100, 8).unwrap();
        p.add_note(4, 60, 100, 4).unwrap();

        let first = p.note_at(0, 60).unwrap();
        assert_eq!(first.length, 4);
        assert_eq!(p.note_count(), 2);
    }

    #[test]
    fn test_add_note_clamped_against_next_note() {
        let mut p = pattern();
        p.add_note(8, 60, 100, 4).unwrap();
        let note = p.add_note(4, 60, 100, 8).unwrap();
        assert_eq!(note.length, 4);
    }

    #[test]
    fn test_add_note_replaces_same_start() {
        let mut p = pattern();
        p.add_note(4, 60, 50, 2).unwrap();
        p.add_note(4, 60, 120, 3).unwrap();

        assert_eq!(p.note_count(), 1);
        let note = p.note_at(4, 60).unwrap();
        assert_eq!(note.velocity, 120);
        assert_eq!(note.length, 3);
    }

    #[test]
    fn test_notes_sorted_by_step_and_key() {
        let mut p = pattern();
        p.add_note(8, 64, 100, 1).unwrap();
        p.add_note(0, 60, 100, 1).unwrap();
        p.add_note(8, 60, 100, 1).unwrap();

        let starts: Vec<(u32, u8)> = p.notes().iter().map(|n| (n.step, n.key)).collect();
        assert_eq!(starts, vec![(0, 60), (8, 60), (8, 64)]);
    }

    #[test]
    fn test_notes_starting_in_window() {
        let mut p = pattern();
        p.add_note(0, 60, 100, 2).unwrap();
        p.add_note(4, 62, 100, 2).unwrap();
        p.add_note(8, 64, 100, 2).unwrap();

        let keys: Vec<u8> = p.notes_starting_in(4, 8).map(|n| n.key).collect();
        assert_eq!(keys, vec![62]);
    }

    #[test]
    fn test_set_steps_per_beat_truncates_to_grid() {
        let mut p = pattern();
        p.add_note(0, 60, 100, 2).unwrap();
        p.add_note(10, 62, 100, 2).unwrap();

        // 4 beats * 2 steps = 8 steps, the note at 10 falls off the grid
        p.set_steps_per_beat(2);
        assert_eq!(p.total_steps(), 8);
        let keys: Vec<u8> = p.notes().iter().map(|n| n.key).collect();
        assert_eq!(keys, vec![60]);
    }

    #[test]
    fn test_delete_note_by_covered_step() {
        let mut p = pattern();
        p.add_note(4, 60, 100, 4).unwrap();

        // Deleting anywhere inside the note removes it
        let removed = p.delete_note(6, 60).unwrap();
        assert_eq!(removed.step, 4);
        assert!(p.is_empty());

        assert!(matches!(
            p.delete_note(6, 60),
            Err(SongError::NoSuchNote { .. })
        ));
    }

    #[test]
    fn test_set_note_length_clamped() {
        let mut p = pattern();
        p.add_note(0, 60, 100, 2).unwrap();
        p.add_note(8, 60, 100, 2).unwrap();

        // Clamped against the next note on the key
        assert_eq!(p.set_note_length(0, 60, 12).unwrap(), 8);
        // Clamped against the pattern end
        assert_eq!(p.set_note_length(8, 60, 100).unwrap(), 8);
    }

    #[test]
    fn test_set_note_velocity() {
        let mut p = pattern();
        p.add_note(0, 60, 100, 4).unwrap();

        p.set_note_velocity(2, 60, 45).unwrap();
        assert_eq!(p.note_at(0, 60).unwrap().velocity, 45);

        assert!(p.set_note_velocity(0, 61, 45).is_err());
    }

    #[test]
    fn test_set_length_truncates() {
        let mut p = pattern();
        p.add_note(0, 60, 100, 16).unwrap();
        p.add_note(12, 64, 100, 2).unwrap();

        p.set_length(2); // 8 columns now

        assert_eq!(p.note_count(), 1);
        assert_eq!(p.note_at(0, 60).unwrap().length, 8);
    }

    #[test]
    fn test_curves_follow_controller_lifecycle() {
        let mut p = pattern();
        p.insert_curve(ControllerInfo::cc(7, "Volume"));

        p.add_curve_point(7, 0, 100).unwrap();
        p.add_curve_point(7, 8, 20).unwrap();
        assert_eq!(p.curve(7).unwrap().value_at(4), Some(60));

        assert!(matches!(
            p.add_curve_point(1, 0, 0),
            Err(SongError::NoSuchController(1))
        ));
        assert!(matches!(
            p.add_curve_point(7, 99, 0),
            Err(SongError::StepOutOfRange(99))
        ));

        assert_eq!(p.remove_curve_point(7, 8).unwrap(), 20);
        assert!(matches!(
            p.remove_curve_point(7, 8),
            Err(SongError::NoSuchCurvePoint { .. })
        ));

        let curve = p.take_curve(7).unwrap();
        assert_eq!(curve.points().count(), 1);
        assert!(p.curve(7).is_none());
    }

    #[test]
    fn test_rekey_curve() {
        let mut p = pattern();
        p.insert_curve(ControllerInfo::cc(7, "Volume"));
        p.add_curve_point(7, 0, 100).unwrap();

        p.rekey_curve(7, ControllerInfo::cc(11, "Expression"));

        assert!(p.curve(7).is_none());
        assert_eq!(p.curve(11).unwrap().value_at(0), Some(100));
    }
}
