//! Second-granularity countdown used to bound an attempt.
//!
//! The timer does not own a clock or a schedule; whoever drives it calls
//! [`CountdownTimer::tick`] roughly once per second.

use thiserror::Error;

/// Remaining time below which the countdown is shown as urgent.
pub const LOW_TIME_THRESHOLD_SECS: u32 = 5 * 60;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimerError {
    #[error("timer was already started (state: {0:?})")]
    AlreadyStarted(TimerState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerState {
    NotStarted,
    Running,
    Stopped,
    Expired,
}

/// What a single call into the timer produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    /// The countdown moved; `remaining` is the new value.
    Ticked { remaining: u32 },
    /// The countdown reached zero. Reported exactly once per timer.
    Expired,
    /// The timer is not running; nothing changed.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTimer {
    state: TimerState,
    remaining: u32,
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl CountdownTimer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: TimerState::NotStarted,
            remaining: 0,
        }
    }

    /// Start counting down from `duration_seconds`.
    ///
    /// A duration of zero or less expires immediately without entering
    /// `Running`; the returned `TickEvent::Expired` is then the timer's one
    /// expiry signal.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::AlreadyStarted` unless the timer is `NotStarted`.
    pub fn start(&mut self, duration_seconds: i64) -> Result<TickEvent, TimerError> {
        if self.state != TimerState::NotStarted {
            return Err(TimerError::AlreadyStarted(self.state));
        }
        if duration_seconds <= 0 {
            self.remaining = 0;
            self.state = TimerState::Expired;
            return Ok(TickEvent::Expired);
        }

        self.remaining = u32::try_from(duration_seconds).unwrap_or(u32::MAX);
        self.state = TimerState::Running;
        Ok(TickEvent::Ticked {
            remaining: self.remaining,
        })
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> TickEvent {
        if self.state != TimerState::Running {
            return TickEvent::Ignored;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.state = TimerState::Expired;
            return TickEvent::Expired;
        }
        TickEvent::Ticked {
            remaining: self.remaining,
        }
    }

    /// Freeze the countdown. Stopping a timer that is not running is a no-op.
    pub fn stop(&mut self) {
        if self.state == TimerState::Running {
            self.state = TimerState::Stopped;
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    #[must_use]
    pub fn is_running_low(&self) -> bool {
        self.is_running() && self.remaining < LOW_TIME_THRESHOLD_SECS
    }
}

/// Render a countdown as `1h 5m`, `4m 10s` or `9s`.
#[must_use]
pub fn format_remaining(seconds: u32) -> String {
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let mins = minutes % 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}h {mins}m")
    } else if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_and_expires_once() {
        let mut timer = CountdownTimer::new();
        assert_eq!(timer.start(3), Ok(TickEvent::Ticked { remaining: 3 }));
        assert_eq!(timer.tick(), TickEvent::Ticked { remaining: 2 });
        assert_eq!(timer.tick(), TickEvent::Ticked { remaining: 1 });
        assert_eq!(timer.tick(), TickEvent::Expired);
        assert_eq!(timer.state(), TimerState::Expired);

        for _ in 0..5 {
            assert_eq!(timer.tick(), TickEvent::Ignored);
        }
        assert_eq!(timer.remaining(), 0);
    }

    #[test]
    fn non_positive_duration_expires_without_running() {
        for duration in [0, -10] {
            let mut timer = CountdownTimer::new();
            assert_eq!(timer.start(duration), Ok(TickEvent::Expired));
            assert_eq!(timer.state(), TimerState::Expired);
            assert_eq!(timer.tick(), TickEvent::Ignored);
        }
    }

    #[test]
    fn stop_freezes_and_is_idempotent() {
        let mut timer = CountdownTimer::new();
        timer.start(10).unwrap();
        timer.tick();
        timer.stop();
        timer.stop();
        assert_eq!(timer.state(), TimerState::Stopped);
        assert_eq!(timer.tick(), TickEvent::Ignored);
        assert_eq!(timer.remaining(), 9);
    }

    #[test]
    fn stop_after_expiry_keeps_expired() {
        let mut timer = CountdownTimer::new();
        timer.start(1).unwrap();
        assert_eq!(timer.tick(), TickEvent::Expired);
        timer.stop();
        assert_eq!(timer.state(), TimerState::Expired);
    }

    #[test]
    fn ticks_before_start_are_ignored() {
        let mut timer = CountdownTimer::new();
        assert_eq!(timer.tick(), TickEvent::Ignored);
        assert_eq!(timer.state(), TimerState::NotStarted);
    }

    #[test]
    fn cannot_restart_a_finished_timer() {
        let mut timer = CountdownTimer::new();
        timer.start(5).unwrap();
        timer.stop();
        assert_eq!(
            timer.start(5),
            Err(TimerError::AlreadyStarted(TimerState::Stopped))
        );
    }

    #[test]
    fn formats_like_the_countdown_badge() {
        assert_eq!(format_remaining(9), "9s");
        assert_eq!(format_remaining(250), "4m 10s");
        assert_eq!(format_remaining(3900), "1h 5m");
        assert_eq!(format_remaining(0), "0s");
    }

    #[test]
    fn running_low_below_five_minutes() {
        let mut timer = CountdownTimer::new();
        timer.start(301).unwrap();
        assert!(!timer.is_running_low());
        timer.tick();
        timer.tick();
        assert!(timer.is_running_low());
    }
}
