// Transport - playback control and shared playhead state
// The pump thread reads this state through atomics, control code mutates it

use crate::sequencer::tempo::{BeatTime, TempoMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Transport state (play/pause/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped | TransportState::Paused)
    }
}

/// Shared transport state
/// Thread-safe via atomics for communication with the pump thread
#[derive(Debug)]
pub struct SharedTransportState {
    playing: AtomicBool,
    paused: AtomicBool,
    position_frames: AtomicU64,
    loop_enabled: AtomicBool,
    loop_start_frames: AtomicU64,
    loop_end_frames: AtomicU64,
}

impl SharedTransportState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> TransportState {
        if self.playing.load(Ordering::Relaxed) {
            TransportState::Playing
        } else if self.paused.load(Ordering::Relaxed) {
            TransportState::Paused
        } else {
            TransportState::Stopped
        }
    }

    pub fn position_frames(&self) -> u64 {
        self.position_frames.load(Ordering::Relaxed)
    }

    pub fn set_position_frames(&self, frames: u64) {
        self.position_frames.store(frames, Ordering::Relaxed);
    }

    /// Advance the playhead by a frame count, wrapping inside the loop
    /// region when looping is enabled. Returns the new position.
    pub fn advance_position(&self, delta_frames: u64) -> u64 {
        let current = self.position_frames.load(Ordering::Relaxed);
        let mut new_pos = current + delta_frames;

        if self.loop_enabled.load(Ordering::Relaxed) {
            let loop_start = self.loop_start_frames.load(Ordering::Relaxed);
            let loop_end = self.loop_end_frames.load(Ordering::Relaxed);

            if loop_end > loop_start && new_pos >= loop_end {
                let loop_length = loop_end - loop_start;
                let overflow = new_pos - loop_end;
                new_pos = loop_start + (overflow % loop_length);
            }
        }

        self.position_frames.store(new_pos, Ordering::Relaxed);
        new_pos
    }

    pub fn is_loop_enabled(&self) -> bool {
        self.loop_enabled.load(Ordering::Relaxed)
    }

    pub fn loop_region(&self) -> (u64, u64) {
        (
            self.loop_start_frames.load(Ordering::Relaxed),
            self.loop_end_frames.load(Ordering::Relaxed),
        )
    }

    pub fn set_loop_region(&self, start_frames: u64, end_frames: u64) {
        assert!(end_frames >= start_frames, "Loop end must not precede start");
        self.loop_start_frames.store(start_frames, Ordering::Relaxed);
        self.loop_end_frames.store(end_frames, Ordering::Relaxed);
    }

    pub fn set_loop_enabled(&self, enabled: bool) {
        self.loop_enabled.store(enabled, Ordering::Relaxed);
    }
}

impl Default for SharedTransportState {
    fn default() -> Self {
        Self {
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            position_frames: AtomicU64::new(0),
            loop_enabled: AtomicBool::new(false),
            loop_start_frames: AtomicU64::new(0),
            loop_end_frames: AtomicU64::new(0),
        }
    }
}

/// Transport controller
/// Manages playback state and the playhead; beat-domain reads and seeks go
/// through the song's tempo map
pub struct Transport {
    shared_state: Arc<SharedTransportState>,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            shared_state: SharedTransportState::new(),
        }
    }

    /// Create with existing shared state (for the pump thread side)
    pub fn with_shared_state(shared_state: Arc<SharedTransportState>) -> Self {
        Self { shared_state }
    }

    /// Get shared state (for passing to the pump thread)
    pub fn shared_state(&self) -> Arc<SharedTransportState> {
        Arc::clone(&self.shared_state)
    }

    pub fn state(&self) -> TransportState {
        self.shared_state.state()
    }

    pub fn position_frames(&self) -> u64 {
        self.shared_state.position_frames()
    }

    /// Current playhead position in musical time
    pub fn position(&self, tempo: &TempoMap) -> BeatTime {
        let (time, _) = tempo.frame_to_beat(self.shared_state.position_frames());
        time
    }

    pub fn play(&mut self) {
        self.shared_state.playing.store(true, Ordering::Relaxed);
        self.shared_state.paused.store(false, Ordering::Relaxed);
    }

    /// Stop and rewind to the song start
    pub fn stop(&mut self) {
        self.shared_state.playing.store(false, Ordering::Relaxed);
        self.shared_state.paused.store(false, Ordering::Relaxed);
        self.shared_state.set_position_frames(0);
    }

    /// Pause, keeping the current position
    pub fn pause(&mut self) {
        self.shared_state.playing.store(false, Ordering::Relaxed);
        self.shared_state.paused.store(true, Ordering::Relaxed);
    }

    pub fn toggle_play(&mut self) {
        if self.state().is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Seek to a musical position
    pub fn go_to_beat(&mut self, time: BeatTime, tempo: &TempoMap) {
        self.shared_state
            .set_position_frames(tempo.beat_to_frame(time));
    }

    pub fn set_loop_enabled(&mut self, enabled: bool) {
        self.shared_state.set_loop_enabled(enabled);
    }

    pub fn is_loop_enabled(&self) -> bool {
        self.shared_state.is_loop_enabled()
    }

    /// Set the loop region from beat bounds
    pub fn set_loop_region(&mut self, start: u32, end: u32, tempo: &TempoMap) {
        self.shared_state.set_loop_region(
            tempo.beat_to_frame(BeatTime::new(start, 0)),
            tempo.beat_to_frame(BeatTime::new(end, 0)),
        );
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}
