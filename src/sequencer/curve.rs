// Controller curves - automation data attached to patterns
// A curve holds control points on the pattern grid; values between points
// are linearly interpolated when the player turns them into MIDI events

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved controller number for pitch bend
///
/// Real MIDI CC numbers are 0-127; keeping pitch bend in the same keyspace
/// lets tracks, curves, and song files treat all controllers uniformly.
pub const PITCH_BEND: u32 = 128;

/// Describes a controller a track exposes for automation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerInfo {
    /// Controller number (0-127 = MIDI CC, 128 = pitch bend)
    pub number: u32,
    /// Display name
    pub name: String,
    /// Smallest value a curve point may hold
    pub min: i32,
    /// Largest value a curve point may hold
    pub max: i32,
    /// Value assumed where a pattern has no curve data
    pub default: i32,
    /// Global controllers apply to the whole song rather than one pattern
    pub global: bool,
}

impl ControllerInfo {
    /// A MIDI control change controller with the standard 7-bit range
    pub fn cc(number: u8, name: &str) -> Self {
        assert!(number <= 127, "MIDI CC number must be 0-127");
        Self {
            number: number as u32,
            name: name.to_string(),
            min: 0,
            max: 127,
            default: 64,
            global: false,
        }
    }

    /// The pitch bend controller with the standard 14-bit range
    pub fn pitch_bend() -> Self {
        Self {
            number: PITCH_BEND,
            name: "Pitch bend".to_string(),
            min: -8192,
            max: 8191,
            default: 0,
            global: false,
        }
    }

    pub fn is_pitch_bend(&self) -> bool {
        self.number == PITCH_BEND
    }
}

/// A controller curve: ordered control points over the pattern's steps
///
/// A curve spans `steps + 1` positions so a point can sit on the pattern's
/// closing edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Curve {
    info: ControllerInfo,
    steps: u32,
    points: BTreeMap<u32, i32>,
}

impl Curve {
    /// Create an empty curve over the given number of steps
    pub fn new(info: ControllerInfo, steps: u32) -> Self {
        Self {
            info,
            steps,
            points: BTreeMap::new(),
        }
    }

    /// The controller this curve automates
    pub fn info(&self) -> &ControllerInfo {
        &self.info
    }

    /// Number of steps the curve spans (points may sit on 0..=steps)
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// All control points, ordered by step
    pub fn points(&self) -> impl Iterator<Item = (u32, i32)> + '_ {
        self.points.iter().map(|(&step, &value)| (step, value))
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Add a control point, replacing any existing point on the same step
    /// The value is clamped to the controller's range
    ///
    /// Returns false if the step lies outside the curve.
    pub fn add_point(&mut self, step: u32, value: i32) -> bool {
        if step > self.steps {
            return false;
        }
        let value = value.clamp(self.info.min, self.info.max);
        self.points.insert(step, value);
        true
    }

    /// Remove the control point at the given step, returning its value
    pub fn remove_point(&mut self, step: u32) -> Option<i32> {
        self.points.remove(&step)
    }

    /// Interpolated value at a step
    ///
    /// None outside the span between the first and last point; callers fall
    /// back to the controller's default there.
    pub fn value_at(&self, step: u32) -> Option<i32> {
        let (&first, _) = self.points.iter().next()?;
        let (&last, &last_value) = self.points.iter().next_back()?;

        if step < first || step > last {
            return None;
        }
        if step >= last {
            return Some(last_value);
        }

        // Surrounding points; both exist because first <= step < last
        let (&s0, &v0) = self.points.range(..=step).next_back()?;
        let (&s1, &v1) = self.points.range(step + 1..).next()?;

        if step == s0 {
            return Some(v0);
        }

        let t = (step - s0) as f64 / (s1 - s0) as f64;
        Some((v0 as f64 + t * (v1 - v0) as f64).round() as i32)
    }

    /// Resize the curve, dropping points beyond the new extent
    pub fn resize(&mut self, steps: u32) {
        self.steps = steps;
        self.points.retain(|&step, _| step <= steps);
    }

    /// Replace the controller description (used when a track controller is
    /// edited); points are re-clamped to the new range
    pub fn set_info(&mut self, info: ControllerInfo) {
        for value in self.points.values_mut() {
            *value = (*value).clamp(info.min, info.max);
        }
        self.info = info;
    }
}
