// Song manager for loading and saving song files

use crate::project::serialization::*;
use crate::project::types::SongMetadata;
use crate::sequencer::song::Song;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use zip::{ZipArchive, ZipWriter};

// Per-call counter so concurrent saves and loads in one process never
// share a scratch directory
static TEMP_DIR_SEQ: AtomicU64 = AtomicU64::new(0);

fn unique_temp_name(prefix: &str) -> String {
    let seq = TEMP_DIR_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}_{}", prefix, std::process::id(), seq)
}

/// Song file error types
#[derive(Debug, thiserror::Error)]
pub enum SongFileError {
    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid song structure: {0}")]
    InvalidStructure(String),

    #[error("Unsupported song file format version")]
    InvalidVersion,

    #[error("Missing required files in song archive")]
    MissingFiles,

    #[error("Song validation failed: {0}")]
    ValidationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),
}

/// Options for loading a song
#[derive(Debug, Clone)]
pub struct SongLoadOptions {
    /// Run structural validation after loading
    pub validate: bool,
}

impl Default for SongLoadOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}

/// Handles saving and loading song files
///
/// A song file is a ZIP archive holding `manifest.json` (browsable
/// metadata) and `song.ron` (the full body). Saving goes through a
/// temporary directory next to the target path which is zipped and then
/// removed.
pub struct SongManager {
    default_frame_rate: u32,
}

impl SongManager {
    pub fn new(default_frame_rate: u32) -> Self {
        Self { default_frame_rate }
    }

    pub fn default_frame_rate(&self) -> u32 {
        self.default_frame_rate
    }

    /// Create a fresh song with one empty track
    pub fn create_new_song(&self, title: &str) -> Song {
        let mut song = Song::new(Song::DEFAULT_LENGTH, self.default_frame_rate);
        song.set_title(title);
        song.add_track("Track 1");
        song.mark_clean();
        song
    }

    /// Save a song to a ZIP archive, clearing its dirty flag on success
    pub fn save_song<P: AsRef<Path>>(
        &self,
        song: &mut Song,
        song_path: P,
    ) -> Result<(), SongFileError> {
        let song_path = song_path.as_ref();
        let song_dir = song_path
            .parent()
            .ok_or_else(|| SongFileError::FileSystem("Invalid song path".to_string()))?;

        std::fs::create_dir_all(song_dir).map_err(|e| {
            SongFileError::FileSystem(format!("Failed to create song directory: {}", e))
        })?;

        let temp_dir = song_dir.join(unique_temp_name(".temp_save"));
        std::fs::create_dir_all(&temp_dir).map_err(|e| {
            SongFileError::FileSystem(format!("Failed to create temp directory: {}", e))
        })?;

        // Keep the original creation timestamp across saves
        let created = read_existing_created(song_path);
        let metadata = SongMetadata::from_song(song, created.as_deref());

        let manifest_json = serialize_metadata_to_json(&metadata)?;
        std::fs::write(temp_dir.join("manifest.json"), manifest_json).map_err(|e| {
            SongFileError::FileSystem(format!("Failed to write manifest: {}", e))
        })?;

        let song_ron = serialize_to_ron(song)?;
        std::fs::write(temp_dir.join("song.ron"), song_ron).map_err(|e| {
            SongFileError::FileSystem(format!("Failed to write song body: {}", e))
        })?;

        let zip_file = File::create(song_path).map_err(|e| {
            SongFileError::FileSystem(format!("Failed to create song file: {}", e))
        })?;
        let mut zip_writer = ZipWriter::new(zip_file);
        add_directory_to_zip(&mut zip_writer, &temp_dir)?;
        zip_writer.finish().map_err(SongFileError::Zip)?;

        std::fs::remove_dir_all(&temp_dir).map_err(|e| {
            SongFileError::FileSystem(format!("Failed to clean up temp directory: {}", e))
        })?;

        song.mark_clean();
        Ok(())
    }

    /// Load a song from a ZIP archive
    pub fn load_song<P: AsRef<Path>>(
        &self,
        song_path: P,
        options: &SongLoadOptions,
    ) -> Result<Song, SongFileError> {
        let song_path = song_path.as_ref();

        let zip_file = File::open(song_path).map_err(|e| {
            SongFileError::FileSystem(format!("Failed to open song file: {}", e))
        })?;
        let mut zip_archive = ZipArchive::new(zip_file).map_err(SongFileError::Zip)?;

        let temp_dir = std::env::temp_dir().join(unique_temp_name("gridseq_extract"));
        zip_archive.extract(&temp_dir).map_err(SongFileError::Zip)?;

        let result = self.load_from_extracted(&temp_dir, options);

        std::fs::remove_dir_all(&temp_dir).map_err(|e| {
            SongFileError::FileSystem(format!("Failed to clean up temp directory: {}", e))
        })?;

        result
    }

    fn load_from_extracted(
        &self,
        temp_dir: &Path,
        options: &SongLoadOptions,
    ) -> Result<Song, SongFileError> {
        let manifest_path = temp_dir.join("manifest.json");
        let body_path = temp_dir.join("song.ron");
        if !manifest_path.exists() || !body_path.exists() {
            return Err(SongFileError::MissingFiles);
        }

        let manifest_json = std::fs::read_to_string(&manifest_path).map_err(|e| {
            SongFileError::FileSystem(format!("Failed to read manifest: {}", e))
        })?;
        let metadata = deserialize_metadata_from_json(&manifest_json)?;

        if !metadata.version.can_load() {
            return Err(SongFileError::InvalidVersion);
        }

        let song_ron = std::fs::read_to_string(&body_path).map_err(|e| {
            SongFileError::FileSystem(format!("Failed to read song body: {}", e))
        })?;
        let song = deserialize_from_ron(&song_ron)?;

        if options.validate {
            crate::project::validate_song(&song)
                .map_err(|e| SongFileError::ValidationFailed(e.to_string()))?;
        }

        Ok(song)
    }
}

/// Pull the creation timestamp out of an existing archive's manifest
fn read_existing_created(song_path: &Path) -> Option<String> {
    let zip_file = File::open(song_path).ok()?;
    let mut archive = ZipArchive::new(zip_file).ok()?;
    let mut manifest = archive.by_name("manifest.json").ok()?;
    let mut json = String::new();
    std::io::Read::read_to_string(&mut manifest, &mut json).ok()?;
    deserialize_metadata_from_json(&json)
        .ok()
        .map(|m| m.created)
}

/// Add a directory's files to the ZIP, paths relative to `dir_path`
fn add_directory_to_zip<P: AsRef<Path>>(
    zip_writer: &mut ZipWriter<File>,
    dir_path: P,
) -> Result<(), SongFileError> {
    use walkdir::WalkDir;

    let dir_path = dir_path.as_ref();

    for entry in WalkDir::new(dir_path) {
        let entry = entry.map_err(|e| {
            SongFileError::FileSystem(format!("Failed to walk directory: {}", e))
        })?;

        let path = entry.path();
        if path.is_file() {
            let file_name = path.strip_prefix(dir_path).map_err(|e| {
                SongFileError::FileSystem(format!("Failed to get relative path: {}", e))
            })?;

            let zip_path = format!("{}", file_name.display());
            let options: zip::write::FileOptions<()> = zip::write::FileOptions::default();
            zip_writer.start_file(&*zip_path, options)?;

            let file = File::open(path).map_err(|e| {
                SongFileError::FileSystem(format!("Failed to open file for ZIP: {}", e))
            })?;
            let mut reader = std::io::BufReader::new(file);
            std::io::copy(&mut reader, zip_writer).map_err(|e| {
                SongFileError::FileSystem(format!("Failed to write to ZIP: {}", e))
            })?;
        }
    }

    Ok(())
}
