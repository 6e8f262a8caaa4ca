// Sequencer engine - wall-clock pump thread driving MIDI output
// The control side talks to the pump through a lock-free command ring and
// the shared transport atomics; the pump is the only writer of playback
// state transitions so note releases always precede position moves

use crate::messaging::channels::{EngineCommandProducer, create_engine_command_channel};
use crate::messaging::command::EngineCommand;
use crate::midi::event::MidiEventTimed;
use crate::midi::output::InstrumentConnection;
use crate::sequencer::player::SequencerPlayer;
use crate::sequencer::song::Song;
use crate::sequencer::tempo::BeatTime;
use crate::sequencer::track::TrackId;
use crate::sequencer::transport::{SharedTransportState, Transport, TransportState};
use ringbuf::traits::{Consumer, Producer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const COMMAND_CHANNEL_CAPACITY: usize = 256;
const PUMP_INTERVAL: Duration = Duration::from_millis(2);

/// The playback engine
///
/// Owns the song behind an `RwLock` shared with the pump thread. Edits on
/// the control side take the write lock; the pump takes short read locks
/// once per cycle. Dropping the sequencer shuts the pump down and joins it.
pub struct Sequencer {
    song: Arc<RwLock<Song>>,
    shared_state: Arc<SharedTransportState>,
    command_tx: EngineCommandProducer,
    shutdown: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
}

impl Sequencer {
    pub fn new(song: Song) -> Self {
        let song = Arc::new(RwLock::new(song));
        let shared_state = SharedTransportState::new();
        let (command_tx, command_rx) = create_engine_command_channel(COMMAND_CHANNEL_CAPACITY);
        let shutdown = Arc::new(AtomicBool::new(false));

        let pump = PumpThread {
            song: Arc::clone(&song),
            transport: Transport::with_shared_state(Arc::clone(&shared_state)),
            player: SequencerPlayer::new(),
            command_rx,
            shutdown: Arc::clone(&shutdown),
            connections: HashMap::new(),
        };
        let handle = thread::Builder::new()
            .name("gridseq-pump".into())
            .spawn(move || pump.run());

        let pump = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!("[sequencer] Failed to spawn pump thread: {}", e);
                None
            }
        };

        Self {
            song,
            shared_state,
            command_tx,
            shutdown,
            pump,
        }
    }

    /// Shared handle to the song; callers take the write lock to edit
    pub fn song(&self) -> Arc<RwLock<Song>> {
        Arc::clone(&self.song)
    }

    pub fn transport_state(&self) -> TransportState {
        self.shared_state.state()
    }

    /// Current playhead position in the beat domain
    pub fn position(&self) -> BeatTime {
        let frames = self.shared_state.position_frames();
        match self.song.read() {
            Ok(song) => song.tempo().frame_to_beat(frames).0,
            Err(_) => BeatTime::new(0, 0),
        }
    }

    pub fn play(&mut self) {
        self.send(EngineCommand::Play);
    }

    /// Stop playback and rewind to the song start
    pub fn stop(&mut self) {
        self.send(EngineCommand::Stop);
    }

    /// Stop playback, keeping the playhead where it is
    pub fn pause(&mut self) {
        self.send(EngineCommand::Pause);
    }

    pub fn go_to_beat(&mut self, time: BeatTime) {
        self.send(EngineCommand::GoToBeat(time));
    }

    /// Enable or disable looping over the song's loop bounds
    pub fn set_loop_enabled(&mut self, enabled: bool) {
        if enabled {
            if let Ok(song) = self.song.read() {
                let tempo = song.tempo();
                let start = tempo.beat_to_frame(BeatTime::new(song.loop_start(), 0));
                let end = tempo.beat_to_frame(BeatTime::new(song.loop_end(), 0));
                self.shared_state.set_loop_region(start, end);
            }
        }
        self.shared_state.set_loop_enabled(enabled);
    }

    pub fn is_loop_enabled(&self) -> bool {
        self.shared_state.is_loop_enabled()
    }

    /// Route a track's events to the named MIDI output port
    pub fn set_track_instrument(&mut self, track: TrackId, port_name: &str) {
        self.send(EngineCommand::SetTrackInstrument {
            track,
            port_name: port_name.to_string(),
        });
    }

    pub fn clear_track_instrument(&mut self, track: TrackId) {
        self.send(EngineCommand::ClearTrackInstrument(track));
    }

    /// All notes off on every connected instrument
    pub fn panic(&mut self) {
        self.send(EngineCommand::Panic);
    }

    fn send(&mut self, command: EngineCommand) {
        if self.command_tx.try_push(command).is_err() {
            eprintln!("[sequencer] Engine command channel full, command dropped");
        }
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        // The flag is checked every pump cycle, so shutdown goes through
        // even when the command ring is full
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.pump.take() {
            if handle.join().is_err() {
                eprintln!("[sequencer] Pump thread panicked");
            }
        }
    }
}

struct PumpThread {
    song: Arc<RwLock<Song>>,
    transport: Transport,
    player: SequencerPlayer,
    command_rx: crate::messaging::channels::EngineCommandConsumer,
    shutdown: Arc<AtomicBool>,
    connections: HashMap<TrackId, InstrumentConnection>,
}

impl PumpThread {
    fn run(mut self) {
        let mut last_tick = Instant::now();
        // Fractional frames carried between cycles so the clock never drifts
        let mut frame_remainder = 0.0f64;

        while !self.shutdown.load(Ordering::Relaxed) {
            self.drain_commands();

            let now = Instant::now();
            let elapsed = now.duration_since(last_tick);
            last_tick = now;

            if self.transport.state() == TransportState::Playing {
                let events = {
                    let song = match self.song.read() {
                        Ok(song) => song,
                        Err(_) => break,
                    };
                    let exact =
                        elapsed.as_secs_f64() * song.tempo().frame_rate() as f64 + frame_remainder;
                    let delta = exact as u64;
                    frame_remainder = exact - delta as f64;

                    if delta > 0 {
                        let start = self.transport.position_frames();
                        let shared = self.transport.shared_state();
                        // Re-read loop bounds from the song so edits made
                        // while looping take effect without a re-enable
                        if shared.is_loop_enabled() {
                            let tempo = song.tempo();
                            shared.set_loop_region(
                                tempo.beat_to_frame(BeatTime::new(song.loop_start(), 0)),
                                tempo.beat_to_frame(BeatTime::new(song.loop_end(), 0)),
                            );
                        }
                        let new_pos = shared.advance_position(delta);

                        if new_pos == start + delta {
                            self.player.process_range(&song, start..start + delta, 0)
                        } else {
                            // Wrapped inside the loop region: play out to the
                            // loop end, release everything, resume at the start
                            let (loop_start, loop_end) = shared.loop_region();
                            // A shrunk loop can leave the playhead past the
                            // end; play nothing for the head in that case
                            let boundary = loop_end.max(start);
                            let head = (boundary - start) as u32;
                            let mut events = self.player.process_range(&song, start..boundary, 0);
                            events.extend(self.player.all_notes_off(head));
                            events.extend(self.player.process_range(
                                &song,
                                loop_start..new_pos,
                                head,
                            ));
                            events
                        }
                    } else {
                        Vec::new()
                    }
                };
                self.deliver(events);
            } else {
                frame_remainder = 0.0;
            }

            thread::sleep(PUMP_INTERVAL);
        }

        self.release_all();
        self.player.reset();
    }

    fn drain_commands(&mut self) {
        while let Some(command) = self.command_rx.try_pop() {
            match command {
                EngineCommand::Play => self.transport.play(),
                EngineCommand::Stop => {
                    self.release_all();
                    self.transport.stop();
                }
                EngineCommand::Pause => {
                    self.release_all();
                    self.transport.pause();
                }
                EngineCommand::GoToBeat(time) => {
                    self.release_all();
                    if let Ok(song) = self.song.read() {
                        self.transport.go_to_beat(time, song.tempo());
                    }
                }
                EngineCommand::SetTrackInstrument { track, port_name } => {
                    match InstrumentConnection::connect(&port_name) {
                        Ok(connection) => {
                            self.connections.insert(track, connection);
                        }
                        Err(e) => {
                            eprintln!("[sequencer] Failed to connect '{}': {}", port_name, e);
                        }
                    }
                }
                EngineCommand::ClearTrackInstrument(track) => {
                    if let Some(mut connection) = self.connections.remove(&track) {
                        if let Some(channel) = self.track_channel(track) {
                            connection.all_notes_off(channel);
                        }
                    }
                }
                EngineCommand::Panic => {
                    self.player.reset();
                    let channels: Vec<_> = self
                        .connections
                        .keys()
                        .map(|&track| (track, self.track_channel(track)))
                        .collect();
                    for (track, channel) in channels {
                        if let (Some(connection), Some(channel)) =
                            (self.connections.get_mut(&track), channel)
                        {
                            connection.all_notes_off(channel);
                        }
                    }
                }
            }
        }
    }

    fn track_channel(&self, track: TrackId) -> Option<u8> {
        self.song
            .read()
            .ok()
            .and_then(|song| song.track(track).map(|t| t.channel()))
    }

    /// Send pending NoteOffs for everything the player has sounding
    fn release_all(&mut self) {
        let events = self.player.all_notes_off(0);
        self.deliver(events);
    }

    /// Forward events to each track's instrument; tracks without a
    /// connection are silent
    fn deliver(&mut self, events: Vec<(TrackId, MidiEventTimed)>) {
        for (track, timed) in events {
            if let Some(connection) = self.connections.get_mut(&track) {
                connection.send(timed.event);
            }
        }
    }
}
