//! Sleep timer: a countdown advanced by an injected clock.
//!
//! The timer only reports what happened; the session decides how a completion
//! maps onto the engine (see [`TimerCompletion`]).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Durations offered by the UI, in minutes.
pub const DURATION_OPTIONS: [u32; 7] = [5, 15, 30, 45, 60, 90, 120];

const ONE_SECOND: Duration = Duration::from_secs(1);

/// Countdown configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSettings {
    pub duration_minutes: u32,
    /// Length of the final fade; zero stops sounds without fading.
    pub fade_out_seconds: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            duration_minutes: 30,
            fade_out_seconds: 30,
        }
    }
}

impl TimerSettings {
    pub fn total_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Notable transitions reported alongside a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    /// Remaining time reached the fade window.
    FadeStarted,
    /// Countdown reached zero.
    Completed { fade_out_ms: u64 },
}

/// One elapsed second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub remaining_seconds: u64,
    pub signal: Option<TimerSignal>,
}

/// What the engine should do when the countdown ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCompletion {
    FadeOutAll(Duration),
    StopAll,
}

impl TimerCompletion {
    pub fn from_fade_ms(fade_out_ms: u64) -> Self {
        if fade_out_ms > 0 {
            TimerCompletion::FadeOutAll(Duration::from_millis(fade_out_ms))
        } else {
            TimerCompletion::StopAll
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    /// Settings can only change while idle.
    #[error("Timer settings are locked until the timer is reset")]
    Locked,
    #[error("Timer duration must be greater than zero")]
    ZeroDuration,
    #[error("Timer has completed; reset it before starting again")]
    Completed,
}

#[derive(Debug, Clone)]
pub struct SleepTimer {
    settings: TimerSettings,
    state: TimerState,
    remaining_seconds: u64,
    carry: Duration,
}

impl Default for SleepTimer {
    fn default() -> Self {
        Self::new(TimerSettings::default())
    }
}

impl SleepTimer {
    pub fn new(settings: TimerSettings) -> Self {
        Self {
            settings,
            state: TimerState::Idle,
            remaining_seconds: settings.total_seconds(),
            carry: Duration::ZERO,
        }
    }

    pub fn settings(&self) -> TimerSettings {
        self.settings
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Duration and fade selectors are only editable while idle.
    pub fn selectors_locked(&self) -> bool {
        self.state != TimerState::Idle
    }

    /// Inside the fade window of an unfinished countdown.
    pub fn is_fading(&self) -> bool {
        matches!(self.state, TimerState::Running | TimerState::Paused)
            && self.settings.fade_out_seconds > 0
            && self.remaining_seconds <= u64::from(self.settings.fade_out_seconds)
    }

    /// Remaining time as `MM:SS`.
    pub fn display(&self) -> String {
        format_remaining(self.remaining_seconds)
    }

    pub fn set_duration_minutes(&mut self, minutes: u32) -> Result<(), TimerError> {
        self.ensure_idle()?;
        self.settings.duration_minutes = minutes;
        self.remaining_seconds = self.settings.total_seconds();
        Ok(())
    }

    pub fn set_fade_out_seconds(&mut self, seconds: u32) -> Result<(), TimerError> {
        self.ensure_idle()?;
        self.settings.fade_out_seconds = seconds;
        Ok(())
    }

    /// Start from idle or resume after a pause. Already running is a no-op.
    pub fn start(&mut self) -> Result<(), TimerError> {
        match self.state {
            TimerState::Running => Ok(()),
            TimerState::Completed => Err(TimerError::Completed),
            TimerState::Idle if self.settings.duration_minutes == 0 => {
                Err(TimerError::ZeroDuration)
            }
            TimerState::Idle | TimerState::Paused => {
                info!(
                    remaining = self.remaining_seconds,
                    fade_out = self.settings.fade_out_seconds,
                    "Sleep timer running"
                );
                self.state = TimerState::Running;
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) {
        if self.state == TimerState::Running {
            self.state = TimerState::Paused;
            self.carry = Duration::ZERO;
            debug!(remaining = self.remaining_seconds, "Sleep timer paused");
        }
    }

    /// Back to idle with the full duration restored.
    pub fn reset(&mut self) {
        self.state = TimerState::Idle;
        self.remaining_seconds = self.settings.total_seconds();
        self.carry = Duration::ZERO;
    }

    /// Count down one second.
    pub fn tick(&mut self) -> Option<TimerTick> {
        if self.state != TimerState::Running {
            return None;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        let fade = u64::from(self.settings.fade_out_seconds);
        let signal = if self.remaining_seconds == 0 {
            self.state = TimerState::Completed;
            self.carry = Duration::ZERO;
            let fade_out_ms = fade * 1_000;
            info!(fade_out_ms, "Sleep timer completed");
            Some(TimerSignal::Completed { fade_out_ms })
        } else if fade > 0 && self.remaining_seconds == fade {
            debug!(fade, "Sleep timer entering fade window");
            Some(TimerSignal::FadeStarted)
        } else {
            None
        };
        Some(TimerTick {
            remaining_seconds: self.remaining_seconds,
            signal,
        })
    }

    /// Feed elapsed wall time; one tick per whole second accumulated.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<TimerTick> {
        if self.state != TimerState::Running {
            return Vec::new();
        }
        self.carry += elapsed;
        let mut ticks = Vec::new();
        while self.carry >= ONE_SECOND {
            self.carry -= ONE_SECOND;
            match self.tick() {
                Some(tick) => ticks.push(tick),
                None => break,
            }
        }
        ticks
    }

    fn ensure_idle(&self) -> Result<(), TimerError> {
        if self.selectors_locked() {
            Err(TimerError::Locked)
        } else {
            Ok(())
        }
    }
}

/// `MM:SS`; minutes grow past two digits for long durations.
pub fn format_remaining(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
