// Concrete song-edit commands

use crate::command::trait_def::{CommandError, CommandResult, UndoableCommand};
use crate::sequencer::note::Note;
use crate::sequencer::pattern::{Pattern, PatternId};
use crate::sequencer::song::Song;
use crate::sequencer::track::{SequenceEntry, Track, TrackId};

// --- note edits ---

/// Add a note to a pattern
///
/// `add_note` may truncate or replace neighbouring notes, so undo restores
/// the pattern's full note list captured before the edit.
pub struct AddNoteCommand {
    track: TrackId,
    pattern: PatternId,
    step: u32,
    key: u8,
    velocity: u8,
    length: u32,
    old_notes: Option<Vec<Note>>,
}

impl AddNoteCommand {
    pub fn new(track: TrackId, pattern: PatternId, step: u32, key: u8, velocity: u8, length: u32) -> Self {
        Self {
            track,
            pattern,
            step,
            key,
            velocity,
            length,
            old_notes: None,
        }
    }
}

impl UndoableCommand for AddNoteCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let pattern = song.track_mut(self.track)?.pattern_mut(self.pattern)?;
        self.old_notes = Some(pattern.notes().to_vec());
        pattern.add_note(self.step, self.key, self.velocity, self.length)?;
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let notes = self
            .old_notes
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        song.track_mut(self.track)?
            .pattern_mut(self.pattern)?
            .restore_notes(notes);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Add note {} at step {}", self.key, self.step)
    }
}

/// Delete the note covering (step, key)
pub struct DeleteNoteCommand {
    track: TrackId,
    pattern: PatternId,
    step: u32,
    key: u8,
    removed: Option<Note>,
}

impl DeleteNoteCommand {
    pub fn new(track: TrackId, pattern: PatternId, step: u32, key: u8) -> Self {
        Self {
            track,
            pattern,
            step,
            key,
            removed: None,
        }
    }
}

impl UndoableCommand for DeleteNoteCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let note = song
            .track_mut(self.track)?
            .pattern_mut(self.pattern)?
            .delete_note(self.step, self.key)?;
        self.removed = Some(note);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let note = self
            .removed
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        // Re-adding the trimmed note puts it back exactly; its neighbours
        // were not touched by the delete
        song.track_mut(self.track)?
            .pattern_mut(self.pattern)?
            .add_note(note.step, note.key, note.velocity, note.length)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Delete note {} at step {}", self.key, self.step)
    }
}

pub struct SetNoteVelocityCommand {
    track: TrackId,
    pattern: PatternId,
    step: u32,
    key: u8,
    velocity: u8,
    old: Option<u8>,
}

impl SetNoteVelocityCommand {
    pub fn new(track: TrackId, pattern: PatternId, step: u32, key: u8, velocity: u8) -> Self {
        Self {
            track,
            pattern,
            step,
            key,
            velocity,
            old: None,
        }
    }
}

impl UndoableCommand for SetNoteVelocityCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let pattern = song.track_mut(self.track)?.pattern_mut(self.pattern)?;
        self.old = pattern.note_at(self.step, self.key).map(|n| n.velocity);
        pattern.set_note_velocity(self.step, self.key, self.velocity)?;
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let old = self
            .old
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        song.track_mut(self.track)?
            .pattern_mut(self.pattern)?
            .set_note_velocity(self.step, self.key, old)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Set note velocity to {}", self.velocity)
    }
}

pub struct SetNoteLengthCommand {
    track: TrackId,
    pattern: PatternId,
    step: u32,
    key: u8,
    length: u32,
    old: Option<u32>,
}

impl SetNoteLengthCommand {
    pub fn new(track: TrackId, pattern: PatternId, step: u32, key: u8, length: u32) -> Self {
        Self {
            track,
            pattern,
            step,
            key,
            length,
            old: None,
        }
    }
}

impl UndoableCommand for SetNoteLengthCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let pattern = song.track_mut(self.track)?.pattern_mut(self.pattern)?;
        self.old = pattern.note_at(self.step, self.key).map(|n| n.length);
        pattern.set_note_length(self.step, self.key, self.length)?;
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let old = self
            .old
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        song.track_mut(self.track)?
            .pattern_mut(self.pattern)?
            .set_note_length(self.step, self.key, old)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Set note length to {}", self.length)
    }
}

// --- track edits ---

/// Add a track; redo after undo restores the same track id
pub struct AddTrackCommand {
    name: String,
    created: Option<TrackId>,
    removed: Option<Track>,
}

impl AddTrackCommand {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created: None,
            removed: None,
        }
    }

    /// The id of the track this command created, once executed
    pub fn created_track(&self) -> Option<TrackId> {
        self.created
    }
}

impl UndoableCommand for AddTrackCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        if let Some(track) = self.removed.take() {
            song.restore_track(track);
        } else {
            self.created = Some(song.add_track(&self.name));
        }
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let id = self
            .created
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        self.removed = Some(song.remove_track(id)?);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Add track '{}'", self.name)
    }
}

pub struct RemoveTrackCommand {
    track: TrackId,
    removed: Option<Track>,
}

impl RemoveTrackCommand {
    pub fn new(track: TrackId) -> Self {
        Self {
            track,
            removed: None,
        }
    }
}

impl UndoableCommand for RemoveTrackCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        self.removed = Some(song.remove_track(self.track)?);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let track = self
            .removed
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        song.restore_track(track);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Remove track {}", self.track)
    }
}

pub struct SetTrackNameCommand {
    track: TrackId,
    name: String,
    old: Option<String>,
}

impl SetTrackNameCommand {
    pub fn new(track: TrackId, name: &str) -> Self {
        Self {
            track,
            name: name.to_string(),
            old: None,
        }
    }
}

impl UndoableCommand for SetTrackNameCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let track = song.track_mut(self.track)?;
        self.old = Some(track.name().to_string());
        track.set_name(&self.name);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let old = self
            .old
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        song.track_mut(self.track)?.set_name(&old);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Rename track to '{}'", self.name)
    }
}

pub struct SetTrackChannelCommand {
    track: TrackId,
    channel: u8,
    old: Option<u8>,
}

impl SetTrackChannelCommand {
    pub fn new(track: TrackId, channel: u8) -> Self {
        Self {
            track,
            channel,
            old: None,
        }
    }
}

impl UndoableCommand for SetTrackChannelCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let track = song.track_mut(self.track)?;
        let old = track.channel();
        track.set_channel(self.channel)?;
        self.old = Some(old);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let old = self
            .old
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        song.track_mut(self.track)?.set_channel(old)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Set track channel to {}", self.channel)
    }
}

// --- pattern edits ---

pub struct AddPatternCommand {
    track: TrackId,
    name: String,
    length: u32,
    steps_per_beat: u32,
    created: Option<PatternId>,
    removed: Option<Pattern>,
}

impl AddPatternCommand {
    pub fn new(track: TrackId, name: &str, length: u32, steps_per_beat: u32) -> Self {
        Self {
            track,
            name: name.to_string(),
            length,
            steps_per_beat,
            created: None,
            removed: None,
        }
    }

    pub fn created_pattern(&self) -> Option<PatternId> {
        self.created
    }
}

impl UndoableCommand for AddPatternCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let track = song.track_mut(self.track)?;
        if let Some(pattern) = self.removed.take() {
            track.restore_pattern(pattern);
        } else {
            self.created = Some(track.add_pattern(&self.name, self.length, self.steps_per_beat));
        }
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let id = self
            .created
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        self.removed = Some(song.track_mut(self.track)?.remove_pattern(id)?);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Add pattern '{}'", self.name)
    }
}

/// Remove a pattern; fails while the sequence still references it
pub struct RemovePatternCommand {
    track: TrackId,
    pattern: PatternId,
    removed: Option<Pattern>,
}

impl RemovePatternCommand {
    pub fn new(track: TrackId, pattern: PatternId) -> Self {
        Self {
            track,
            pattern,
            removed: None,
        }
    }
}

impl UndoableCommand for RemovePatternCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        self.removed = Some(song.track_mut(self.track)?.remove_pattern(self.pattern)?);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let pattern = self
            .removed
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        song.track_mut(self.track)?.restore_pattern(pattern);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Remove pattern {}", self.pattern)
    }
}

// --- sequence edits ---

/// Place a pattern on a track's timeline
///
/// Placement may truncate or replace neighbouring entries, so undo restores
/// the whole sequence captured before the edit.
pub struct SetSequenceEntryCommand {
    track: TrackId,
    beat: u32,
    pattern: PatternId,
    length: Option<u32>,
    old_sequence: Option<Vec<SequenceEntry>>,
}

impl SetSequenceEntryCommand {
    pub fn new(track: TrackId, beat: u32, pattern: PatternId, length: Option<u32>) -> Self {
        Self {
            track,
            beat,
            pattern,
            length,
            old_sequence: None,
        }
    }
}

impl UndoableCommand for SetSequenceEntryCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let track = song.track_mut(self.track)?;
        self.old_sequence = Some(track.sequence().to_vec());
        track.set_sequence_entry(self.beat, self.pattern, self.length)?;
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let sequence = self
            .old_sequence
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        song.track_mut(self.track)?.restore_sequence(sequence);
        Ok(())
    }

    fn description(&self) -> String {
        format!("Place pattern {} at beat {}", self.pattern, self.beat)
    }
}

pub struct RemoveSequenceEntryCommand {
    track: TrackId,
    beat: u32,
    removed: Option<SequenceEntry>,
}

impl RemoveSequenceEntryCommand {
    pub fn new(track: TrackId, beat: u32) -> Self {
        Self {
            track,
            beat,
            removed: None,
        }
    }
}

impl UndoableCommand for RemoveSequenceEntryCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        self.removed = Some(song.track_mut(self.track)?.remove_sequence_entry(self.beat)?);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let entry = self
            .removed
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        song.track_mut(self.track)?
            .set_sequence_entry(entry.start, entry.pattern, Some(entry.length))?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Remove sequence entry at beat {}", self.beat)
    }
}

// --- tempo edits ---

pub struct AddTempoChangeCommand {
    beat: u32,
    bpm: u32,
    /// `Some(None)` records that no change existed on the beat before
    old: Option<Option<u32>>,
}

impl AddTempoChangeCommand {
    pub fn new(beat: u32, bpm: u32) -> Self {
        Self {
            beat,
            bpm,
            old: None,
        }
    }
}

impl UndoableCommand for AddTempoChangeCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let existing = song
            .tempo()
            .changes()
            .iter()
            .find(|c| c.beat == self.beat)
            .map(|c| c.bpm);
        song.add_tempo_change(self.beat, self.bpm)?;
        self.old = Some(existing);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let old = self
            .old
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        match old {
            Some(bpm) => song.add_tempo_change(self.beat, bpm)?,
            None => {
                song.remove_tempo_change(self.beat);
            }
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("Set tempo to {} BPM at beat {}", self.bpm, self.beat)
    }
}

pub struct RemoveTempoChangeCommand {
    beat: u32,
    removed: Option<u32>,
}

impl RemoveTempoChangeCommand {
    pub fn new(beat: u32) -> Self {
        Self {
            beat,
            removed: None,
        }
    }
}

impl UndoableCommand for RemoveTempoChangeCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let bpm = song
            .tempo()
            .changes()
            .iter()
            .find(|c| c.beat == self.beat)
            .map(|c| c.bpm)
            .ok_or_else(|| {
                CommandError::InvalidState(format!("No tempo change at beat {}", self.beat))
            })?;
        song.remove_tempo_change(self.beat);
        self.removed = Some(bpm);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let bpm = self
            .removed
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        song.add_tempo_change(self.beat, bpm)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Remove tempo change at beat {}", self.beat)
    }
}

// --- song edits ---

struct LengthSnapshot {
    length: u32,
    loop_start: u32,
    loop_end: u32,
    /// Per-track sequences as they were before the resize truncated them
    sequences: Vec<(TrackId, Vec<SequenceEntry>)>,
}

/// Resize the song
///
/// Shrinking truncates track sequences and the loop region, so the command
/// snapshots those for undo.
pub struct SetSongLengthCommand {
    length: u32,
    old: Option<LengthSnapshot>,
}

impl SetSongLengthCommand {
    pub fn new(length: u32) -> Self {
        Self { length, old: None }
    }
}

impl UndoableCommand for SetSongLengthCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let snapshot = LengthSnapshot {
            length: song.length(),
            loop_start: song.loop_start(),
            loop_end: song.loop_end(),
            sequences: song
                .tracks()
                .map(|t| (t.id, t.sequence().to_vec()))
                .collect(),
        };
        song.set_length(self.length)?;
        self.old = Some(snapshot);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let snapshot = self
            .old
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        song.set_length(snapshot.length)?;
        song.set_loop_end(snapshot.loop_end)?;
        song.set_loop_start(snapshot.loop_start)?;
        for (track, sequence) in snapshot.sequences {
            song.track_mut(track)?.restore_sequence(sequence);
        }
        Ok(())
    }

    fn description(&self) -> String {
        format!("Set song length to {} beats", self.length)
    }
}

pub struct SetLoopRangeCommand {
    start: u32,
    end: u32,
    old: Option<(u32, u32)>,
}

impl SetLoopRangeCommand {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            old: None,
        }
    }
}

impl UndoableCommand for SetLoopRangeCommand {
    fn execute(&mut self, song: &mut Song) -> CommandResult<()> {
        let old = (song.loop_start(), song.loop_end());
        apply_loop_range(song, self.start, self.end)?;
        self.old = Some(old);
        Ok(())
    }

    fn undo(&mut self, song: &mut Song) -> CommandResult<()> {
        let (start, end) = self
            .old
            .take()
            .ok_or_else(|| CommandError::UndoFailed("Not executed".into()))?;
        apply_loop_range(song, start, end)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("Set loop to beats {}..{}", self.start, self.end)
    }
}

/// Order the two bound updates so the intermediate state stays valid
fn apply_loop_range(song: &mut Song, start: u32, end: u32) -> CommandResult<()> {
    if start <= song.loop_end() {
        song.set_loop_start(start)?;
        song.set_loop_end(end)?;
    } else {
        song.set_loop_end(end)?;
        song.set_loop_start(start)?;
    }
    Ok(())
}
