// Track - an instrument lane: a set of patterns, a sequence timeline saying
// when they play, a MIDI channel, and the controllers it exposes

use crate::sequencer::curve::ControllerInfo;
use crate::sequencer::pattern::{Pattern, PatternId};
use crate::sequencer::song::SongError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Track identifier, unique within a song
pub type TrackId = u32;

/// Placement of a pattern on the track timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceEntry {
    /// The pattern being played
    pub pattern: PatternId,
    /// First beat of the placement
    pub start: u32,
    /// Length in beats (never exceeds the pattern length)
    pub length: u32,
}

impl SequenceEntry {
    /// First beat after the entry ends
    pub fn end_beat(&self) -> u32 {
        self.start + self.length
    }

    /// Check if the entry is playing on a given beat
    pub fn covers_beat(&self, beat: u32) -> bool {
        beat >= self.start && beat < self.end_beat()
    }
}

/// A track in a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique identifier within the owning song
    pub id: TrackId,

    name: String,

    /// MIDI channel events are routed to (0-15)
    channel: u8,

    /// Length in beats, kept in sync with the song length
    length: u32,

    /// Patterns owned by this track
    patterns: BTreeMap<PatternId, Pattern>,

    /// Sequence entries sorted by start beat, never overlapping
    sequence: Vec<SequenceEntry>,

    /// Controllers this track exposes for automation
    controllers: Vec<ControllerInfo>,

    next_pattern_id: PatternId,
}

impl Track {
    /// Create a new empty track of the given length in beats
    pub fn new(id: TrackId, name: &str, length: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            channel: 0,
            length,
            patterns: BTreeMap::new(),
            sequence: Vec::new(),
            controllers: Vec::new(),
            next_pattern_id: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn set_channel(&mut self, channel: u8) -> Result<(), SongError> {
        if channel > 15 {
            return Err(SongError::InvalidChannel(channel));
        }
        self.channel = channel;
        Ok(())
    }

    /// Length in beats
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Resize the track; sequence entries beyond the new end are dropped,
    /// entries running past it are clamped
    pub(crate) fn set_length(&mut self, length: u32) {
        self.length = length;
        self.sequence.retain(|e| e.start < length);
        for entry in self.sequence.iter_mut() {
            entry.length = entry.length.min(length - entry.start);
        }
    }

    // --- patterns ---

    /// Create a new pattern, returning its id
    pub fn add_pattern(&mut self, name: &str, length: u32, steps_per_beat: u32) -> PatternId {
        let id = self.next_pattern_id;
        self.next_pattern_id += 1;

        let mut pattern = Pattern::new(id, name, length, steps_per_beat);
        for info in &self.controllers {
            pattern.insert_curve(info.clone());
        }
        self.patterns.insert(id, pattern);
        id
    }

    /// Remove a pattern
    ///
    /// Fails while any sequence entry still references the pattern; callers
    /// remove those entries first.
    pub fn remove_pattern(&mut self, id: PatternId) -> Result<Pattern, SongError> {
        if self.sequence.iter().any(|e| e.pattern == id) {
            return Err(SongError::PatternInUse(id));
        }
        self.patterns.remove(&id).ok_or(SongError::NoSuchPattern(id))
    }

    /// Deep-copy a pattern (notes and curves) under a fresh id
    pub fn duplicate_pattern(&mut self, id: PatternId) -> Result<PatternId, SongError> {
        let source = self.patterns.get(&id).ok_or(SongError::NoSuchPattern(id))?;

        let new_id = self.next_pattern_id;
        self.next_pattern_id += 1;

        let mut copy = source.clone();
        copy.id = new_id;
        copy.set_name(&format!("{} copy", source.name()));
        self.patterns.insert(new_id, copy);

        Ok(new_id)
    }

    /// Put back a removed pattern under its original id (undo support)
    pub(crate) fn restore_pattern(&mut self, pattern: Pattern) {
        self.next_pattern_id = self.next_pattern_id.max(pattern.id + 1);
        self.patterns.insert(pattern.id, pattern);
    }

    pub fn pattern(&self, id: PatternId) -> Option<&Pattern> {
        self.patterns.get(&id)
    }

    pub fn pattern_mut(&mut self, id: PatternId) -> Result<&mut Pattern, SongError> {
        self.patterns.get_mut(&id).ok_or(SongError::NoSuchPattern(id))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.values()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    // --- sequence ---

    /// Sequence entries, sorted by start beat
    pub fn sequence(&self) -> &[SequenceEntry] {
        &self.sequence
    }

    /// The entry playing on a given beat, if any
    pub fn sequence_entry_at(&self, beat: u32) -> Option<&SequenceEntry> {
        self.sequence.iter().find(|e| e.covers_beat(beat))
    }

    /// Place a pattern on the timeline at `beat`
    ///
    /// `length` defaults to the pattern length and is clamped against the
    /// pattern length, the track end, and the next entry. An earlier entry
    /// overlapping `beat` is truncated to end there; an entry starting
    /// exactly at `beat` is replaced. Returns the entry as stored.
    pub fn set_sequence_entry(
        &mut self,
        beat: u32,
        pattern: PatternId,
        length: Option<u32>,
    ) -> Result<SequenceEntry, SongError> {
        let pattern_length = self
            .patterns
            .get(&pattern)
            .ok_or(SongError::NoSuchPattern(pattern))?
            .length();

        if beat >= self.length {
            return Err(SongError::BeatOutOfRange(beat));
        }

        self.sequence.retain(|e| e.start != beat);
        for entry in self.sequence.iter_mut() {
            if entry.start < beat && entry.end_beat() > beat {
                entry.length = beat - entry.start;
            }
        }

        let mut max_end = self.length;
        if let Some(next_start) = self
            .sequence
            .iter()
            .filter(|e| e.start > beat)
            .map(|e| e.start)
            .min()
        {
            max_end = max_end.min(next_start);
        }

        let length = length
            .unwrap_or(pattern_length)
            .min(pattern_length)
            .min(max_end - beat)
            .max(1);

        let entry = SequenceEntry {
            pattern,
            start: beat,
            length,
        };
        let index = self
            .sequence
            .binary_search_by_key(&beat, |e| e.start)
            .unwrap_or_else(|i| i);
        self.sequence.insert(index, entry);

        Ok(entry)
    }

    /// Resize the entry playing on `beat`; the stored length is clamped the
    /// same way as in [`Track::set_sequence_entry`]. Returns the stored length.
    pub fn set_sequence_entry_length(&mut self, beat: u32, length: u32) -> Result<u32, SongError> {
        let index = self
            .sequence
            .iter()
            .position(|e| e.covers_beat(beat))
            .ok_or(SongError::NoSuchSequenceEntry(beat))?;
        let entry = self.sequence[index];

        let pattern_length = self
            .patterns
            .get(&entry.pattern)
            .map(|p| p.length())
            .unwrap_or(entry.length);

        let mut max_end = self.length;
        if let Some(next_start) = self
            .sequence
            .iter()
            .filter(|e| e.start > entry.start)
            .map(|e| e.start)
            .min()
        {
            max_end = max_end.min(next_start);
        }

        let length = length
            .min(pattern_length)
            .min(max_end - entry.start)
            .max(1);

        self.sequence[index].length = length;
        Ok(length)
    }

    /// Remove the entry playing on `beat`, returning it
    pub fn remove_sequence_entry(&mut self, beat: u32) -> Result<SequenceEntry, SongError> {
        let index = self
            .sequence
            .iter()
            .position(|e| e.covers_beat(beat))
            .ok_or(SongError::NoSuchSequenceEntry(beat))?;
        Ok(self.sequence.remove(index))
    }

    /// Put back a previously captured sequence (undo support)
    pub(crate) fn restore_sequence(&mut self, sequence: Vec<SequenceEntry>) {
        self.sequence = sequence;
    }

    // --- controllers ---

    /// Controllers this track exposes
    pub fn controllers(&self) -> &[ControllerInfo] {
        &self.controllers
    }

    pub fn controller(&self, number: u32) -> Option<&ControllerInfo> {
        self.controllers.iter().find(|c| c.number == number)
    }

    /// Register a controller and give every pattern an empty curve for it
    pub fn add_controller(&mut self, info: ControllerInfo) -> Result<(), SongError> {
        if self.controller(info.number).is_some() {
            return Err(SongError::DuplicateController(info.number));
        }
        for pattern in self.patterns.values_mut() {
            pattern.insert_curve(info.clone());
        }
        self.controllers.push(info);
        Ok(())
    }

    /// Remove a controller and its curves from every pattern
    pub fn remove_controller(&mut self, number: u32) -> Result<ControllerInfo, SongError> {
        let index = self
            .controllers
            .iter()
            .position(|c| c.number == number)
            .ok_or(SongError::NoSuchController(number))?;
        for pattern in self.patterns.values_mut() {
            pattern.take_curve(number);
        }
        Ok(self.controllers.remove(index))
    }

    /// Replace a controller's description, re-keying pattern curves if the
    /// number changed
    pub fn set_controller_info(
        &mut self,
        number: u32,
        info: ControllerInfo,
    ) -> Result<(), SongError> {
        let index = self
            .controllers
            .iter()
            .position(|c| c.number == number)
            .ok_or(SongError::NoSuchController(number))?;
        if info.number != number && self.controller(info.number).is_some() {
            return Err(SongError::DuplicateController(info.number));
        }

        for pattern in self.patterns.values_mut() {
            pattern.rekey_curve(number, info.clone());
        }
        self.controllers[index] = info;

        Ok(())
    }
}
