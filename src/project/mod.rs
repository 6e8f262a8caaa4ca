// Song persistence
// ZIP container format: manifest.json (metadata) + song.ron (full body)

pub mod manager;
pub mod serialization;
pub mod types;

pub use manager::{SongFileError, SongLoadOptions, SongManager};
pub use types::{FormatVersion, SongMetadata};

use crate::sequencer::song::Song;

/// Structural checks run on loaded songs
///
/// The edit API keeps these invariants; a hand-edited or corrupted file can
/// break them, and a broken song would misbehave silently during playback.
pub fn validate_song(song: &Song) -> Result<(), SongFileError> {
    if song.length() == 0 {
        return Err(SongFileError::InvalidStructure(
            "Song length must be at least 1 beat".to_string(),
        ));
    }

    if song.loop_start() > song.loop_end() || song.loop_end() > song.length() {
        return Err(SongFileError::InvalidStructure(format!(
            "Loop region {}..{} does not fit a {}-beat song",
            song.loop_start(),
            song.loop_end(),
            song.length()
        )));
    }

    let changes = song.tempo().changes();
    for pair in changes.windows(2) {
        if pair[0].beat >= pair[1].beat {
            return Err(SongFileError::InvalidStructure(
                "Tempo changes must be strictly ordered by beat".to_string(),
            ));
        }
    }
    for change in changes {
        if change.bpm == 0 {
            return Err(SongFileError::InvalidStructure(format!(
                "Tempo change at beat {} has zero BPM",
                change.beat
            )));
        }
    }

    for track in song.tracks() {
        if track.channel() > 15 {
            return Err(SongFileError::InvalidStructure(format!(
                "Track {} channel {} exceeds the MIDI range",
                track.id,
                track.channel()
            )));
        }

        for entry in track.sequence() {
            if track.pattern(entry.pattern).is_none() {
                return Err(SongFileError::InvalidStructure(format!(
                    "Track {} sequences missing pattern {}",
                    track.id, entry.pattern
                )));
            }
            if entry.length == 0 || entry.end_beat() > track.length() {
                return Err(SongFileError::InvalidStructure(format!(
                    "Track {} has a sequence entry outside the track at beat {}",
                    track.id, entry.start
                )));
            }
        }
        for pair in track.sequence().windows(2) {
            if pair[0].end_beat() > pair[1].start {
                return Err(SongFileError::InvalidStructure(format!(
                    "Track {} has overlapping sequence entries at beat {}",
                    track.id, pair[1].start
                )));
            }
        }

        for pattern in track.patterns() {
            if pattern.length() == 0 || pattern.steps_per_beat() == 0 {
                return Err(SongFileError::InvalidStructure(format!(
                    "Pattern {} has a degenerate grid",
                    pattern.id
                )));
            }
            for note in pattern.notes() {
                if note.key > 127
                    || note.velocity == 0
                    || note.velocity > 127
                    || note.length == 0
                    || note.end_step() > pattern.total_steps()
                {
                    return Err(SongFileError::InvalidStructure(format!(
                        "Pattern {} holds an invalid note at step {}",
                        pattern.id, note.step
                    )));
                }
            }
            for curve in pattern.curves() {
                let info = curve.info();
                for (step, value) in curve.points() {
                    if step > pattern.total_steps() {
                        return Err(SongFileError::InvalidStructure(format!(
                            "Curve {} has a point beyond the grid",
                            info.number
                        )));
                    }
                    if value < info.min || value > info.max {
                        return Err(SongFileError::InvalidStructure(format!(
                            "Curve {} has a value {} outside {}..{}",
                            info.number, value, info.min, info.max
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_fresh_song() {
        let mut song = Song::new(16, 48000);
        let track = song.add_track("Lead");
        let t = song.track_mut(track).unwrap();
        let pattern = t.add_pattern("P", 2, 4);
        t.set_sequence_entry(0, pattern, None).unwrap();
        t.pattern_mut(pattern).unwrap().add_note(0, 60, 100, 2).unwrap();

        assert!(validate_song(&song).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_pattern_reference() {
        let mut song = Song::new(16, 48000);
        let track = song.add_track("Lead");
        let t = song.track_mut(track).unwrap();
        let pattern = t.add_pattern("P", 2, 4);
        t.set_sequence_entry(0, pattern, None).unwrap();

        // Corrupt the song the way a bad file would
        t.remove_sequence_entry(0).unwrap();
        t.remove_pattern(pattern).unwrap();
        let ghost = crate::sequencer::track::SequenceEntry {
            pattern,
            start: 0,
            length: 2,
        };
        song.track_mut(track).unwrap().restore_sequence(vec![ghost]);

        let result = validate_song(&song);
        assert!(matches!(result, Err(SongFileError::InvalidStructure(_))));
    }
}
