//! Gain automation shared by the simulated and cpal graphs.

use std::time::Duration;

/// Linear ramp between two gain values on the graph clock (seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    /// Gain at `start`.
    pub from: f32,
    /// Gain reached at `end` and held afterwards.
    pub to: f32,
    /// Ramp anchor time in seconds.
    pub start: f64,
    /// Ramp completion time in seconds.
    pub end: f64,
}

/// Gain parameter with optional linear automation, shared by every backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainAutomation {
    value: f32,
    ramp: Option<GainRamp>,
}

impl GainAutomation {
    /// Create a parameter holding a constant value.
    pub fn new(value: f32) -> Self {
        Self { value, ramp: None }
    }

    /// Gain at the given graph time.
    pub fn value_at(&self, time: f64) -> f32 {
        let Some(ramp) = self.ramp else {
            return self.value;
        };
        if time <= ramp.start {
            return ramp.from;
        }
        if time >= ramp.end || ramp.end <= ramp.start {
            return ramp.to;
        }
        let progress = ((time - ramp.start) / (ramp.end - ramp.start)) as f32;
        ramp.from + (ramp.to - ramp.from) * progress
    }

    /// Replace any automation with a constant value.
    pub fn set(&mut self, value: f32) {
        self.value = value;
        self.ramp = None;
    }

    /// Ramp linearly from the value at `start` to `target` at `end`.
    pub fn ramp_to(&mut self, target: f32, start: f64, end: f64) {
        let from = self.value_at(start);
        self.ramp = Some(GainRamp {
            from,
            to: target,
            start,
            end: end.max(start),
        });
        self.value = target;
    }

    /// Active or most recent ramp, if any.
    pub fn ramp(&self) -> Option<GainRamp> {
        self.ramp
    }

    /// Drop a ramp that finished before `time`.
    pub fn settle(&mut self, time: f64) {
        if self.ramp.is_some_and(|ramp| time >= ramp.end) {
            self.ramp = None;
        }
    }
}

impl Default for GainAutomation {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Clamp a user supplied volume into the unit range; NaN maps to silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}

pub(crate) fn duration_secs(duration: Duration) -> f64 {
    duration.as_secs_f64()
}

pub(crate) fn fade_frames_for_duration(sample_rate: u32, fade: Duration) -> u32 {
    if fade.is_zero() || sample_rate == 0 {
        return 1;
    }
    let frames = (fade.as_secs_f64() * sample_rate as f64).ceil();
    frames.clamp(1.0, u32::MAX as f64) as u32
}
