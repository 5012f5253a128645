//! Clock and single-threaded timers
//!
//! Handlers never own OS timers. Each one keeps [`Timer`] deadlines and the
//! owner of the event loop asks for the earliest deadline, sleeps until then
//! and calls `dispatch_timers`. Tests drive the same code with [`ManualClock`].

use std::cell::Cell;
use std::fmt;
use std::time::{Duration, Instant};

/// Source of the current time
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Instant::now()),
        }
    }

    /// Jump to an instant. Going backwards is ignored.
    pub fn set(&self, now: Instant) {
        if now > self.now.get() {
            self.now.set(now);
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

/// Single-shot or repeating deadline
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Instant>,
    interval: Option<Duration>,
}

impl Timer {
    pub const fn new() -> Self {
        Self {
            deadline: None,
            interval: None,
        }
    }

    /// Arm a single-shot timer, replacing any previous deadline
    pub fn start(&mut self, now: Instant, timeout: Duration) {
        self.deadline = Some(now + timeout);
        self.interval = None;
    }

    /// Arm a timer that re-arms itself every `interval` after firing
    pub fn start_repeating(&mut self, now: Instant, interval: Duration) {
        self.deadline = Some(now + interval);
        self.interval = Some(interval);
    }

    pub fn stop(&mut self) {
        self.deadline = None;
        self.interval = None;
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true once per expiry. Single-shot timers disarm themselves.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = self.interval.map(|interval| deadline + interval);
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.deadline, self.interval) {
            (None, _) => write!(f, "Timer(stopped)"),
            (Some(_), Some(interval)) => write!(f, "Timer(repeating {interval:?})"),
            (Some(_), None) => write!(f, "Timer(single-shot)"),
        }
    }
}

/// Earliest of several optional deadlines
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_shot_fires_once() {
        let clock = ManualClock::new();
        let mut timer = Timer::new();
        timer.start(clock.now(), Duration::from_millis(50));

        clock.advance(Duration::from_millis(49));
        assert!(!timer.poll(clock.now()));
        clock.advance(Duration::from_millis(1));
        assert!(timer.poll(clock.now()));
        assert!(!timer.is_active());
        assert!(!timer.poll(clock.now()));
    }

    #[test]
    fn test_repeating_rearms() {
        let clock = ManualClock::new();
        let mut timer = Timer::new();
        timer.start_repeating(clock.now(), Duration::from_millis(5));

        clock.advance(Duration::from_millis(5));
        assert!(timer.poll(clock.now()));
        assert!(timer.is_active());
        assert!(!timer.poll(clock.now()));
        clock.advance(Duration::from_millis(5));
        assert!(timer.poll(clock.now()));

        timer.stop();
        clock.advance(Duration::from_millis(5));
        assert!(!timer.poll(clock.now()));
    }

    #[test]
    fn test_earliest() {
        let now = Instant::now();
        let later = now + Duration::from_millis(10);
        assert_eq!(earliest([None, Some(later), Some(now)]), Some(now));
        assert_eq!(earliest([None, None]), None);
    }
}
