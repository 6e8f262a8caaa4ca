// Sequencer player - turns song state into timed MIDI events
// Pure song-reading logic: the pump thread owns the clock, the player owns
// note bookkeeping

use crate::midi::event::{MidiEvent, MidiEventTimed};
use crate::sequencer::curve::PITCH_BEND;
use crate::sequencer::song::Song;
use crate::sequencer::tempo::BeatTime;
use crate::sequencer::track::TrackId;
use std::collections::HashMap;
use std::ops::Range;

const TPB: u64 = BeatTime::TICKS_PER_BEAT as u64;

/// A note that got its NoteOn and is waiting for its NoteOff
#[derive(Debug, Clone, Copy)]
struct ActiveNote {
    track: TrackId,
    channel: u8,
    key: u8,
    /// Absolute song tick the NoteOff is due at
    end_tick: u64,
}

/// Converts pattern notes and curves into MIDI events for a frame range
///
/// Events are tagged with the owning track so the engine can route them to
/// that track's instrument connection. The player keeps the NoteOn/NoteOff
/// pairing invariant: every NoteOn it emits is matched by a NoteOff, either
/// when the note ends, when its sequence entry ends, or through
/// [`SequencerPlayer::all_notes_off`] on stop, seek, and loop wrap.
pub struct SequencerPlayer {
    active_notes: Vec<ActiveNote>,

    /// Last controller value sent per (track, controller); identical
    /// repeats are suppressed
    last_controller_values: HashMap<(TrackId, u32), i32>,
}

impl SequencerPlayer {
    pub fn new() -> Self {
        Self {
            active_notes: Vec::new(),
            last_controller_values: HashMap::new(),
        }
    }

    /// Generate events for a contiguous frame range
    ///
    /// The range must not cross a loop wrap; the caller splits wrapped
    /// blocks and inserts [`SequencerPlayer::all_notes_off`] between the
    /// halves. `block_offset` shifts the emitted `frames_from_now` values,
    /// used for the second half of a split block.
    pub fn process_range(
        &mut self,
        song: &Song,
        range: Range<u64>,
        block_offset: u32,
    ) -> Vec<(TrackId, MidiEventTimed)> {
        let tempo = song.tempo();
        let start_tick = tempo.frame_to_beat(range.start).0.to_total_ticks();
        let end_tick = tempo.frame_to_beat(range.end).0.to_total_ticks();

        let mut events = Vec::new();
        if start_tick >= end_tick {
            return events;
        }

        let offset_of = |tick: u64| -> u32 {
            let frame = tempo.tick_to_frame(tick);
            block_offset + frame.saturating_sub(range.start) as u32
        };

        for track in song.tracks() {
            let channel = track.channel();

            for entry in track.sequence() {
                let entry_start = entry.start as u64 * TPB;
                let entry_end = entry.end_beat() as u64 * TPB;
                if entry_end <= start_tick || entry_start >= end_tick {
                    continue;
                }

                let Some(pattern) = track.pattern(entry.pattern) else {
                    continue;
                };
                let spb = pattern.steps_per_beat() as u64;
                let step_tick = |step: u64| entry_start + step * TPB / spb;

                let win_lo = start_tick.max(entry_start);
                let win_hi = end_tick.min(entry_end);

                for note in pattern.notes() {
                    let note_on = step_tick(note.step as u64);
                    if note_on < win_lo || note_on >= win_hi {
                        continue;
                    }

                    // A key still sounding on this channel releases before it
                    // strikes again, at its own end when that comes first
                    if let Some(index) = self
                        .active_notes
                        .iter()
                        .position(|a| a.channel == channel && a.key == note.key)
                    {
                        let stuck = self.active_notes.remove(index);
                        events.push((
                            stuck.track,
                            MidiEventTimed {
                                event: MidiEvent::NoteOff {
                                    channel: stuck.channel,
                                    key: stuck.key,
                                },
                                frames_from_now: offset_of(stuck.end_tick.min(note_on)),
                            },
                        ));
                    }

                    events.push((
                        track.id,
                        MidiEventTimed {
                            event: MidiEvent::NoteOn {
                                channel,
                                key: note.key,
                                velocity: note.velocity,
                            },
                            frames_from_now: offset_of(note_on),
                        },
                    ));

                    // Notes never sound past their sequence entry
                    let end = step_tick(note.end_step() as u64).min(entry_end);
                    self.active_notes.push(ActiveNote {
                        track: track.id,
                        channel,
                        key: note.key,
                        end_tick: end,
                    });
                }

                // Curve points: one event per grid column inside the window
                let step_lo = (win_lo - entry_start) * spb / TPB
                    + u64::from((win_lo - entry_start) * spb % TPB != 0);
                for curve in pattern.curves() {
                    if curve.is_empty() {
                        continue;
                    }
                    let number = curve.info().number;
                    let mut step = step_lo;
                    while step <= pattern.total_steps() as u64 && step_tick(step) < win_hi {
                        if let Some(value) = curve.value_at(step as u32) {
                            let key = (track.id, number);
                            if self.last_controller_values.get(&key) != Some(&value) {
                                self.last_controller_values.insert(key, value);
                                events.push((
                                    track.id,
                                    MidiEventTimed {
                                        event: controller_event(channel, number, value),
                                        frames_from_now: offset_of(step_tick(step)),
                                    },
                                ));
                            }
                        }
                        step += 1;
                    }
                }
            }
        }

        // Release whatever runs out inside this window
        let mut still_active = Vec::with_capacity(self.active_notes.len());
        for note in self.active_notes.drain(..) {
            if note.end_tick < end_tick {
                events.push((
                    note.track,
                    MidiEventTimed {
                        event: MidiEvent::NoteOff {
                            channel: note.channel,
                            key: note.key,
                        },
                        frames_from_now: offset_of(note.end_tick),
                    },
                ));
            } else {
                still_active.push(note);
            }
        }
        self.active_notes = still_active;

        // Stable sort keeps off-before-on ordering at equal offsets
        events.sort_by_key(|(_, e)| e.frames_from_now);
        events
    }

    /// Release everything currently sounding (stop, seek, loop wrap)
    pub fn all_notes_off(&mut self, frames_from_now: u32) -> Vec<(TrackId, MidiEventTimed)> {
        let mut events = Vec::new();

        for note in self.active_notes.drain(..) {
            events.push((
                note.track,
                MidiEventTimed {
                    event: MidiEvent::NoteOff {
                        channel: note.channel,
                        key: note.key,
                    },
                    frames_from_now,
                },
            ));
        }
        self.last_controller_values.clear();

        events
    }

    /// Forget all playback state without emitting events (engine shutdown
    /// after the ports are already gone)
    pub fn reset(&mut self) {
        self.active_notes.clear();
        self.last_controller_values.clear();
    }

    pub fn active_note_count(&self) -> usize {
        self.active_notes.len()
    }
}

impl Default for SequencerPlayer {
    fn default() -> Self {
        Self::new()
    }
}

fn controller_event(channel: u8, number: u32, value: i32) -> MidiEvent {
    if number == PITCH_BEND {
        MidiEvent::PitchBend {
            channel,
            value: value.clamp(-8192, 8191) as i16,
        }
    } else {
        MidiEvent::ControlChange {
            channel,
            controller: number as u8,
            value: value.clamp(0, 127) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::curve::ControllerInfo;
    use crate::sequencer::pattern::PatternId;

    /// One track, one 2-beat pattern at 4 steps/beat, sequenced at beat 0
    fn simple_song() -> (Song, TrackId, PatternId) {
        let mut song = Song::new(8, 48000);
        let track = song.add_track("Lead");
        let t = song.track_mut(track).unwrap();
        let pattern = t.add_pattern("P", 2, 4);
        t.set_sequence_entry(0, pattern, None).unwrap();
        (song, track, pattern)
    }

    #[test]
    fn test_note_on_and_off_in_one_block() {
        let (mut song, track, pattern) = simple_song();
        song.track_mut(track)
            .unwrap()
            .pattern_mut(pattern)
            .unwrap()
            .add_note(0, 60, 100, 1)
            .unwrap();

        let mut player = SequencerPlayer::new();
        // One beat = 24000 frames at 120 BPM; one step = 6000 frames
        let events = player.process_range(&song, 0..24000, 0);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, track);
        assert_eq!(
            events[0].1.event,
            MidiEvent::NoteOn {
                channel: 0,
                key: 60,
                velocity: 100
            }
        );
        assert_eq!(events[0].1.frames_from_now, 0);
        assert_eq!(
            events[1].1.event,
            MidiEvent::NoteOff {
                channel: 0,
                key: 60
            }
        );
        assert_eq!(events[1].1.frames_from_now, 6000);
        assert_eq!(player.active_note_count(), 0);
    }

    #[test]
    fn test_note_off_lands_in_later_block() {
        let (mut song, track, pattern) = simple_song();
        song.track_mut(track)
            .unwrap()
            .pattern_mut(pattern)
            .unwrap()
            .add_note(0, 60, 100, 8) // full two beats
            .unwrap();

        let mut player = SequencerPlayer::new();

        let first = player.process_range(&song, 0..24000, 0);
        assert_eq!(first.len(), 1);
        assert_eq!(player.active_note_count(), 1);

        // Note ends at beat 2 = frame 48000; the half-open windows put that
        // tick in the block starting there
        let second = player.process_range(&song, 24000..48000, 0);
        assert!(second.is_empty());
        assert_eq!(player.active_note_count(), 1);

        let third = player.process_range(&song, 48000..72000, 0);
        assert_eq!(third.len(), 1);
        assert_eq!(
            third[0].1.event,
            MidiEvent::NoteOff {
                channel: 0,
                key: 60
            }
        );
        assert_eq!(third[0].1.frames_from_now, 0);
        assert_eq!(player.active_note_count(), 0);
    }

    #[test]
    fn test_events_routed_to_track_channel() {
        let (mut song, track, pattern) = simple_song();
        {
            let t = song.track_mut(track).unwrap();
            t.set_channel(9).unwrap();
            t.pattern_mut(pattern)
                .unwrap()
                .add_note(4, 36, 110, 1)
                .unwrap();
        }

        let mut player = SequencerPlayer::new();
        let events = player.process_range(&song, 0..48000, 0);

        assert_eq!(
            events[0].1.event,
            MidiEvent::NoteOn {
                channel: 9,
                key: 36,
                velocity: 110
            }
        );
        // Step 4 = beat 1 = frame 24000
        assert_eq!(events[0].1.frames_from_now, 24000);
    }

    #[test]
    fn test_note_cut_at_sequence_entry_end() {
        let mut song = Song::new(8, 48000);
        let track = song.add_track("Lead");
        let t = song.track_mut(track).unwrap();
        let pattern = t.add_pattern("P", 4, 4);
        // Entry only one beat long; the note inside runs to the pattern end
        t.set_sequence_entry(0, pattern, Some(1)).unwrap();
        t.pattern_mut(pattern)
            .unwrap()
            .add_note(0, 60, 100, 16)
            .unwrap();

        let mut player = SequencerPlayer::new();
        let events = player.process_range(&song, 0..48000, 0);

        assert_eq!(events.len(), 2);
        // Cut at the entry end: beat 1 = frame 24000
        assert_eq!(events[1].1.frames_from_now, 24000);
    }

    #[test]
    fn test_all_notes_off_releases_everything() {
        let (mut song, track, pattern) = simple_song();
        song.track_mut(track)
            .unwrap()
            .pattern_mut(pattern)
            .unwrap()
            .add_note(0, 60, 100, 8)
            .unwrap();

        let mut player = SequencerPlayer::new();
        player.process_range(&song, 0..24000, 0);
        assert_eq!(player.active_note_count(), 1);

        let offs = player.all_notes_off(512);
        assert_eq!(offs.len(), 1);
        assert_eq!(offs[0].0, track);
        assert_eq!(offs[0].1.frames_from_now, 512);
        assert_eq!(player.active_note_count(), 0);
    }

    #[test]
    fn test_curve_points_become_control_changes() {
        let (mut song, track, pattern) = simple_song();
        {
            let t = song.track_mut(track).unwrap();
            t.add_controller(ControllerInfo::cc(7, "Volume")).unwrap();
            let p = t.pattern_mut(pattern).unwrap();
            p.add_curve_point(7, 0, 0).unwrap();
            p.add_curve_point(7, 4, 80).unwrap();
        }

        let mut player = SequencerPlayer::new();
        let events = player.process_range(&song, 0..48000, 0);

        let ccs: Vec<_> = events
            .iter()
            .filter_map(|(_, e)| match e.event {
                MidiEvent::ControlChange { value, .. } => Some((e.frames_from_now, value)),
                _ => None,
            })
            .collect();

        // Interpolated: 0, 20, 40, 60 then 80 on the point itself; steps
        // past the last point carry no value
        assert_eq!(
            ccs,
            vec![(0, 0), (6000, 20), (12000, 40), (18000, 60), (24000, 80)]
        );
    }

    #[test]
    fn test_pitch_bend_curve() {
        let (mut song, track, pattern) = simple_song();
        {
            let t = song.track_mut(track).unwrap();
            t.add_controller(ControllerInfo::pitch_bend()).unwrap();
            let p = t.pattern_mut(pattern).unwrap();
            p.add_curve_point(PITCH_BEND, 0, -8192).unwrap();
        }

        let mut player = SequencerPlayer::new();
        let events = player.process_range(&song, 0..24000, 0);

        assert_eq!(
            events[0].1.event,
            MidiEvent::PitchBend {
                channel: 0,
                value: -8192
            }
        );
    }

    #[test]
    fn test_retrigger_releases_before_striking() {
        let (mut song, track, pattern) = simple_song();
        {
            let p = song.track_mut(track).unwrap().pattern_mut(pattern).unwrap();
            p.add_note(0, 60, 100, 8).unwrap();
        }
        // Sequence the same pattern again right after: the long note is
        // still active when its second NoteOn arrives
        {
            let t = song.track_mut(track).unwrap();
            t.set_sequence_entry(2, pattern, None).unwrap();
        }

        let mut player = SequencerPlayer::new();
        // Beats 0..4 in one block (96000 frames)
        let events = player.process_range(&song, 0..96000, 0);

        let at_48000: Vec<_> = events
            .iter()
            .filter(|(_, e)| e.frames_from_now == 48000)
            .collect();
        assert_eq!(at_48000.len(), 2);
        assert!(matches!(at_48000[0].1.event, MidiEvent::NoteOff { .. }));
        assert!(matches!(at_48000[1].1.event, MidiEvent::NoteOn { .. }));
    }

    #[test]
    fn test_empty_window_no_events() {
        let (song, _, _) = simple_song();
        let mut player = SequencerPlayer::new();
        assert!(player.process_range(&song, 1000..1000, 0).is_empty());
    }
}
