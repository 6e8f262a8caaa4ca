// Types for song persistence

use crate::sequencer::song::Song;
use serde::{Deserialize, Serialize};

/// Song file format version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FormatVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn current() -> Self {
        Self::new(1, 0, 0)
    }

    /// Files written by a newer major version are rejected; newer minor
    /// versions within the same major still load
    pub fn can_load(&self) -> bool {
        self.major <= Self::current().major
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Manifest metadata stored next to the song body
///
/// Everything here is duplicated from (or summarised out of) the RON body
/// so browsers can show song info without parsing the full file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongMetadata {
    pub title: String,
    pub version: FormatVersion,
    /// RFC 3339 creation timestamp
    pub created: String,
    /// RFC 3339 last-save timestamp
    pub modified: String,
    pub author: String,
    pub info: String,
    pub length_beats: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub frame_rate: u32,
    /// Tempo in effect at beat 0
    pub initial_bpm: u32,
}

impl SongMetadata {
    /// Build a manifest from the song, stamping `modified` with now
    pub fn from_song(song: &Song, created: Option<&str>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            title: song.title().to_string(),
            version: FormatVersion::current(),
            created: created.map(str::to_string).unwrap_or_else(|| now.clone()),
            modified: now,
            author: song.author().to_string(),
            info: song.info().to_string(),
            length_beats: song.length(),
            loop_start: song.loop_start(),
            loop_end: song.loop_end(),
            frame_rate: song.tempo().frame_rate(),
            initial_bpm: song.tempo().bpm_at(0),
        }
    }
}
