// Song - top-level container: metadata, tempo map, loop bounds, tracks

use crate::sequencer::curve::ControllerInfo;
use crate::sequencer::pattern::PatternId;
use crate::sequencer::tempo::TempoMap;
use crate::sequencer::track::{SequenceEntry, Track, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Errors from song, track, and pattern mutators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SongError {
    #[error("No track with id {0}")]
    NoSuchTrack(TrackId),

    #[error("No pattern with id {0}")]
    NoSuchPattern(PatternId),

    #[error("Pattern {0} is still referenced by the sequence")]
    PatternInUse(PatternId),

    #[error("No note on key {key} at step {step}")]
    NoSuchNote { step: u32, key: u8 },

    #[error("Note position (step {step}, key {key}) outside the pattern grid")]
    NoteOutOfRange { step: u32, key: u8 },

    #[error("Velocity {0} outside the MIDI range 1-127")]
    InvalidVelocity(u8),

    #[error("Note length {0} must be at least 1 step")]
    InvalidNoteLength(u32),

    #[error("Step {0} outside the pattern grid")]
    StepOutOfRange(u32),

    #[error("Beat {0} outside the track")]
    BeatOutOfRange(u32),

    #[error("No sequence entry at beat {0}")]
    NoSuchSequenceEntry(u32),

    #[error("Track already has a controller numbered {0}")]
    DuplicateController(u32),

    #[error("Tempo {0} BPM must be at least 1")]
    InvalidBpm(u32),

    #[error("No controller numbered {0}")]
    NoSuchController(u32),

    #[error("No curve point for controller {number} at step {step}")]
    NoSuchCurvePoint { number: u32, step: u32 },

    #[error("MIDI channel {0} outside 0-15")]
    InvalidChannel(u8),

    #[error("Loop range {start}..{end} invalid for song of {length} beats")]
    InvalidLoopRange { start: u32, end: u32, length: u32 },

    #[error("Song length must be at least 1 beat")]
    InvalidSongLength,
}

/// A song: tempo map, loop bounds, metadata, and the tracks that play it
///
/// Mutations mark the song dirty; persistence clears the flag. The flag
/// itself is not part of the persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    title: String,
    author: String,
    info: String,

    /// Length in beats
    length: u32,

    /// Loop region, in beats; inclusive start, exclusive end
    loop_start: u32,
    loop_end: u32,

    tempo: TempoMap,

    tracks: BTreeMap<TrackId, Track>,

    next_track_id: TrackId,

    #[serde(skip)]
    dirty: bool,
}

impl Song {
    /// Default length for fresh songs, in beats
    pub const DEFAULT_LENGTH: u32 = 32;

    /// Create a new empty song
    pub fn new(length: u32, frame_rate: u32) -> Self {
        assert!(length >= 1, "Song length must be at least 1 beat");
        Self {
            title: "Untitled".to_string(),
            author: String::new(),
            info: String::new(),
            length,
            loop_start: 0,
            loop_end: length,
            tempo: TempoMap::new(frame_rate),
            tracks: BTreeMap::new(),
            next_track_id: 1,
            dirty: false,
        }
    }

    // --- metadata ---

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
        self.dirty = true;
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn set_author(&mut self, author: &str) {
        self.author = author.to_string();
        self.dirty = true;
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    pub fn set_info(&mut self, info: &str) {
        self.info = info.to_string();
        self.dirty = true;
    }

    // --- length and loop bounds ---

    /// Length in beats
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Resize the song; tracks and the loop region are clamped to fit
    pub fn set_length(&mut self, length: u32) -> Result<(), SongError> {
        if length == 0 {
            return Err(SongError::InvalidSongLength);
        }
        self.length = length;
        self.loop_start = self.loop_start.min(length);
        self.loop_end = self.loop_end.min(length);
        for track in self.tracks.values_mut() {
            track.set_length(length);
        }
        self.dirty = true;
        Ok(())
    }

    pub fn loop_start(&self) -> u32 {
        self.loop_start
    }

    pub fn loop_end(&self) -> u32 {
        self.loop_end
    }

    pub fn set_loop_start(&mut self, beat: u32) -> Result<(), SongError> {
        if beat > self.loop_end {
            return Err(SongError::InvalidLoopRange {
                start: beat,
                end: self.loop_end,
                length: self.length,
            });
        }
        self.loop_start = beat;
        self.dirty = true;
        Ok(())
    }

    pub fn set_loop_end(&mut self, beat: u32) -> Result<(), SongError> {
        if beat < self.loop_start || beat > self.length {
            return Err(SongError::InvalidLoopRange {
                start: self.loop_start,
                end: beat,
                length: self.length,
            });
        }
        self.loop_end = beat;
        self.dirty = true;
        Ok(())
    }

    // --- tempo ---

    pub fn tempo(&self) -> &TempoMap {
        &self.tempo
    }

    /// Add (or replace) a tempo change on a whole beat
    pub fn add_tempo_change(&mut self, beat: u32, bpm: u32) -> Result<(), SongError> {
        if bpm == 0 {
            return Err(SongError::InvalidBpm(bpm));
        }
        self.tempo.add_change(beat, bpm);
        self.dirty = true;
        Ok(())
    }

    /// Remove the tempo change at a beat; no-op when none exists there
    pub fn remove_tempo_change(&mut self, beat: u32) -> bool {
        let removed = self.tempo.remove_change(beat).is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    // --- tracks ---

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Result<&mut Track, SongError> {
        match self.tracks.get_mut(&id) {
            Some(track) => {
                self.dirty = true;
                Ok(track)
            }
            None => Err(SongError::NoSuchTrack(id)),
        }
    }

    /// Add a new track, returning its id
    pub fn add_track(&mut self, name: &str) -> TrackId {
        let id = self.next_track_id;
        self.next_track_id += 1;
        self.tracks.insert(id, Track::new(id, name, self.length));
        self.dirty = true;
        id
    }

    /// Remove a track, returning it
    pub fn remove_track(&mut self, id: TrackId) -> Result<Track, SongError> {
        let track = self.tracks.remove(&id).ok_or(SongError::NoSuchTrack(id))?;
        self.dirty = true;
        Ok(track)
    }

    /// Re-insert a previously removed track (undo support)
    pub fn restore_track(&mut self, track: Track) {
        self.next_track_id = self.next_track_id.max(track.id + 1);
        self.tracks.insert(track.id, track);
        self.dirty = true;
    }

    // --- convenience forwarding used by commands and callers ---

    /// Place a pattern on a track's timeline
    pub fn set_sequence_entry(
        &mut self,
        track: TrackId,
        beat: u32,
        pattern: PatternId,
        length: Option<u32>,
    ) -> Result<SequenceEntry, SongError> {
        self.track_mut(track)?.set_sequence_entry(beat, pattern, length)
    }

    /// Register a controller on a track
    pub fn add_controller(
        &mut self,
        track: TrackId,
        info: ControllerInfo,
    ) -> Result<(), SongError> {
        self.track_mut(track)?.add_controller(info)
    }

    // --- dirty flag ---

    /// True when the song has unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Called by persistence after a successful save or load
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

impl Default for Song {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH, 48000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_song() {
        let song = Song::new(16, 48000);
        assert_eq!(song.title(), "Untitled");
        assert_eq!(song.length(), 16);
        assert_eq!(song.loop_start(), 0);
        assert_eq!(song.loop_end(), 16);
        assert_eq!(song.track_count(), 0);
        assert!(!song.is_dirty());
    }

    #[test]
    fn test_metadata_marks_dirty() {
        let mut song = Song::default();
        song.set_title("My Song");
        assert_eq!(song.title(), "My Song");
        assert!(song.is_dirty());

        song.mark_clean();
        song.set_author("Someone");
        song.set_info("About this song");
        assert!(song.is_dirty());
    }

    #[test]
    fn test_track_ids_not_reused() {
        let mut song = Song::default();
        let a = song.add_track("A");
        let b = song.add_track("B");
        song.remove_track(a).unwrap();
        let c = song.add_track("C");

        assert!(c > b);
        assert_eq!(song.track_count(), 2);
        assert!(song.track(a).is_none());
    }

    #[test]
    fn test_remove_missing_track() {
        let mut song = Song::default();
        assert!(matches!(song.remove_track(7), Err(SongError::NoSuchTrack(7))));
    }

    #[test]
    fn test_restore_track_after_remove() {
        let mut song = Song::default();
        let id = song.add_track("A");
        let removed = song.remove_track(id).unwrap();
        song.restore_track(removed);

        assert_eq!(song.track(id).unwrap().name(), "A");
        // Restoring must not let the id be handed out again
        let next = song.add_track("B");
        assert!(next > id);
    }

    #[test]
    fn test_loop_bounds_validated() {
        let mut song = Song::new(16, 48000);

        song.set_loop_end(8).unwrap();
        song.set_loop_start(4).unwrap();
        assert_eq!((song.loop_start(), song.loop_end()), (4, 8));

        assert!(song.set_loop_start(9).is_err());
        assert!(song.set_loop_end(3).is_err());
        assert!(song.set_loop_end(17).is_err());
    }

    #[test]
    fn test_set_length_clamps_loop_and_tracks() {
        let mut song = Song::new(32, 48000);
        let id = song.add_track("A");
        let p = song.track_mut(id).unwrap().add_pattern("P", 8, 4);
        song.set_sequence_entry(id, 24, p, None).unwrap();
        song.set_loop_end(32).unwrap();

        song.set_length(16).unwrap();

        assert_eq!(song.loop_end(), 16);
        assert_eq!(song.track(id).unwrap().length(), 16);
        assert!(song.track(id).unwrap().sequence().is_empty());

        assert!(song.set_length(0).is_err());
    }

    #[test]
    fn test_tempo_changes() {
        let mut song = Song::default();
        song.add_tempo_change(0, 90).unwrap();
        song.add_tempo_change(8, 140).unwrap();

        assert_eq!(song.tempo().bpm_at(4), 90);
        assert_eq!(song.tempo().bpm_at(8), 140);

        assert!(song.remove_tempo_change(8));
        assert!(!song.remove_tempo_change(8));
        assert_eq!(song.tempo().bpm_at(8), 90);
    }

    #[test]
    fn test_zero_bpm_rejected() {
        let mut song = Song::default();

        assert_eq!(song.add_tempo_change(4, 0), Err(SongError::InvalidBpm(0)));
        assert!(song.tempo().changes().is_empty());
        assert!(!song.is_dirty());
    }
}
