// Sequencer module
// Song model, musical time, transport, and the playback engine

pub mod curve;
pub mod engine;
pub mod note;
pub mod pattern;
pub mod player;
pub mod song;
pub mod tempo;
pub mod track;
pub mod transport;

pub use curve::{ControllerInfo, Curve, PITCH_BEND};
pub use engine::Sequencer;
pub use note::Note;
pub use pattern::{Pattern, PatternId};
pub use player::SequencerPlayer;
pub use song::{Song, SongError};
pub use tempo::{BeatTime, TempoChange, TempoMap};
pub use track::{SequenceEntry, Track, TrackId};
pub use transport::{SharedTransportState, Transport, TransportState};
