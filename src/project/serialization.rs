// Serialization utilities for song persistence

use crate::project::manager::SongFileError;
use crate::project::types::SongMetadata;
use crate::sequencer::song::Song;

/// Serialize the full song body to RON
pub fn serialize_to_ron(song: &Song) -> Result<String, SongFileError> {
    ron::ser::to_string_pretty(song, ron::ser::PrettyConfig::default()).map_err(|e| {
        SongFileError::Serialization(format!("Failed to serialize song to RON: {}", e))
    })
}

/// Deserialize the song body from RON
pub fn deserialize_from_ron(ron_data: &str) -> Result<Song, SongFileError> {
    ron::from_str(ron_data).map_err(|e| {
        SongFileError::Serialization(format!("Failed to deserialize song from RON: {}", e))
    })
}

/// Serialize the manifest to JSON
pub fn serialize_metadata_to_json(metadata: &SongMetadata) -> Result<String, SongFileError> {
    serde_json::to_string_pretty(metadata).map_err(|e| {
        SongFileError::Serialization(format!("Failed to serialize manifest to JSON: {}", e))
    })
}

/// Deserialize the manifest from JSON
pub fn deserialize_metadata_from_json(json_data: &str) -> Result<SongMetadata, SongFileError> {
    serde_json::from_str(json_data).map_err(|e| {
        SongFileError::Serialization(format!("Failed to deserialize manifest from JSON: {}", e))
    })
}
