// Tempo map - musical time in beats/ticks and conversion to audio frames

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in musical time: whole beats plus ticks within the beat
/// Tick = subdivision of a beat used for scheduling precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeatTime {
    pub beat: u32,
    pub tick: u32,
}

impl BeatTime {
    /// Ticks per beat, the engine's scheduling resolution
    pub const TICKS_PER_BEAT: u32 = 480;

    /// Creates a new beat position
    pub fn new(beat: u32, tick: u32) -> Self {
        assert!(
            tick < Self::TICKS_PER_BEAT,
            "Tick must be < {}",
            Self::TICKS_PER_BEAT
        );
        Self { beat, tick }
    }

    /// Start of the song (beat 0, tick 0)
    pub fn zero() -> Self {
        Self { beat: 0, tick: 0 }
    }

    /// Convert to total ticks from the song start
    pub fn to_total_ticks(&self) -> u64 {
        self.beat as u64 * Self::TICKS_PER_BEAT as u64 + self.tick as u64
    }

    /// Create from total ticks
    pub fn from_total_ticks(total_ticks: u64) -> Self {
        Self {
            beat: (total_ticks / Self::TICKS_PER_BEAT as u64) as u32,
            tick: (total_ticks % Self::TICKS_PER_BEAT as u64) as u32,
        }
    }

    /// Position in beats as a float (beat + fractional tick)
    pub fn as_beats_f64(&self) -> f64 {
        self.beat as f64 + self.tick as f64 / Self::TICKS_PER_BEAT as f64
    }
}

impl Default for BeatTime {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for BeatTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:03}", self.beat, self.tick)
    }
}

/// A tempo change at a whole beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoChange {
    pub beat: u32,
    pub bpm: u32,
}

/// Default tempo when the map holds no change at beat 0
pub const DEFAULT_BPM: u32 = 120;

/// Maps frames to beats/ticks and back, honoring tempo changes.
///
/// Tempo changes live on whole beats and stay sorted by beat. When no change
/// exists at beat 0 an implicit `DEFAULT_BPM` segment starts there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoMap {
    frame_rate: u32,
    changes: Vec<TempoChange>,
}

impl TempoMap {
    /// Create a new tempo map for the given frame rate
    pub fn new(frame_rate: u32) -> Self {
        assert!(frame_rate > 0, "Frame rate must be > 0");
        Self {
            frame_rate,
            changes: Vec::new(),
        }
    }

    /// Get the frame rate used for conversions
    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// All explicit tempo changes, ordered by beat
    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// Add a tempo change on a whole beat
    /// Replaces an existing change on the same beat
    pub fn add_change(&mut self, beat: u32, bpm: u32) {
        assert!(bpm >= 1, "BPM must be >= 1");

        match self.changes.binary_search_by_key(&beat, |c| c.beat) {
            Ok(index) => self.changes[index].bpm = bpm,
            Err(index) => self.changes.insert(index, TempoChange { beat, bpm }),
        }
    }

    /// Remove the tempo change at the given beat, returning it
    /// Removing the change at beat 0 restores the implicit default tempo
    pub fn remove_change(&mut self, beat: u32) -> Option<TempoChange> {
        match self.changes.binary_search_by_key(&beat, |c| c.beat) {
            Ok(index) => Some(self.changes.remove(index)),
            Err(_) => None,
        }
    }

    /// Tempo in effect at the given beat
    pub fn bpm_at(&self, beat: u32) -> u32 {
        let mut bpm = DEFAULT_BPM;
        for change in &self.changes {
            if change.beat > beat {
                break;
            }
            bpm = change.bpm;
        }
        bpm
    }

    /// Duration of one beat in frames at the given tempo
    fn frames_per_beat(&self, bpm: u32) -> f64 {
        self.frame_rate as f64 * 60.0 / bpm as f64
    }

    /// Tempo segments as (start beat, bpm), always starting at beat 0
    fn segments(&self) -> Vec<(u32, u32)> {
        let mut segments = Vec::with_capacity(self.changes.len() + 1);
        if self.changes.first().map(|c| c.beat) != Some(0) {
            segments.push((0, DEFAULT_BPM));
        }
        for change in &self.changes {
            segments.push((change.beat, change.bpm));
        }
        segments
    }

    /// Convert a musical position to an absolute frame number
    pub fn beat_to_frame(&self, time: BeatTime) -> u64 {
        let target = time.as_beats_f64();
        let segments = self.segments();
        let mut frames = 0.0;

        for (i, &(start, bpm)) in segments.iter().enumerate() {
            let start = start as f64;
            if target <= start {
                break;
            }
            let end = segments
                .get(i + 1)
                .map(|&(b, _)| b as f64)
                .unwrap_or(f64::INFINITY);
            let span = target.min(end) - start;
            frames += span * self.frames_per_beat(bpm);
        }

        frames.round() as u64
    }

    /// Convert an absolute frame number to a musical position and the tempo
    /// in effect there
    pub fn frame_to_beat(&self, frame: u64) -> (BeatTime, u32) {
        let segments = self.segments();
        let mut seg_start_frame = 0.0;
        let mut current = (0u32, DEFAULT_BPM);

        for (i, &(start, bpm)) in segments.iter().enumerate() {
            current = (start, bpm);
            let end = match segments.get(i + 1) {
                Some(&(b, _)) => b,
                None => break,
            };
            let seg_frames = (end - start) as f64 * self.frames_per_beat(bpm);
            if (frame as f64) < seg_start_frame + seg_frames {
                break;
            }
            seg_start_frame += seg_frames;
        }

        let (seg_beat, bpm) = current;
        let beats_in = (frame as f64 - seg_start_frame) / self.frames_per_beat(bpm);
        let total_ticks = (seg_beat as f64 * BeatTime::TICKS_PER_BEAT as f64
            + beats_in * BeatTime::TICKS_PER_BEAT as f64)
            .round() as u64;

        (BeatTime::from_total_ticks(total_ticks), bpm)
    }

    /// Convert an absolute tick count to a frame number
    pub fn tick_to_frame(&self, total_ticks: u64) -> u64 {
        self.beat_to_frame(BeatTime::from_total_ticks(total_ticks))
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(48000)
    }
}
