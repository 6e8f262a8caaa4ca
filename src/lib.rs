// gridseq - pattern-based MIDI sequencer engine

pub mod command;
pub mod messaging;
pub mod midi;
pub mod project;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use command::{CommandError, CommandManager, UndoableCommand};
pub use messaging::channels::create_engine_command_channel;
pub use midi::event::{MidiEvent, MidiEventTimed};
pub use midi::{InstrumentConnection, InstrumentInfo, InstrumentRegistry};
pub use project::{SongLoadOptions, SongManager};
pub use sequencer::{
    BeatTime, ControllerInfo, Note, Pattern, PatternId, SequenceEntry, Sequencer, Song, SongError,
    TempoChange, TempoMap, Track, TrackId, Transport, TransportState,
};
