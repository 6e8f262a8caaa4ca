// Command types - control thread -> engine thread

use crate::sequencer::tempo::BeatTime;
use crate::sequencer::track::TrackId;

/// Control messages the engine thread drains once per pump cycle
///
/// Transport changes go through here rather than straight to the shared
/// atomics so the engine can release sounding notes before the position
/// moves under them.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    Play,
    Stop,
    Pause,
    GoToBeat(BeatTime),
    /// Route a track's events to the named output port
    SetTrackInstrument { track: TrackId, port_name: String },
    ClearTrackInstrument(TrackId),
    /// Immediate all-notes-off on every connected instrument
    Panic,
}
