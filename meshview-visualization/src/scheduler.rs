//! Fixed-interval rotation ticks for the event loop

use std::time::{Duration, Instant};

/// Yields rotation ticks at a fixed period
///
/// The event loop calls [`RotationScheduler::poll`] and applies one step per
/// returned tick; nothing runs behind its back.
#[derive(Debug, Clone)]
pub struct RotationScheduler {
    period: Duration,
    restart_period: Duration,
    next_tick: Option<Instant>,
}

impl RotationScheduler {
    /// Start enabled with `period`; later restarts use `restart_period`
    pub fn new(now: Instant, period: Duration, restart_period: Duration) -> Self {
        Self {
            period,
            restart_period,
            next_tick: Some(now + period),
        }
    }

    /// A scheduler that starts stopped
    pub fn stopped(period: Duration, restart_period: Duration) -> Self {
        Self {
            period,
            restart_period,
            next_tick: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.next_tick.is_some()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stop, or restart at the restart period; returns whether it now runs
    pub fn toggle(&mut self, now: Instant) -> bool {
        match self.next_tick {
            Some(_) => self.next_tick = None,
            None => {
                self.period = self.restart_period;
                self.next_tick = Some(now + self.period);
            }
        }
        self.is_enabled()
    }

    /// Count the next period from `now` if running, dropping missed ticks
    pub fn restart_clock(&mut self, now: Instant) {
        if self.next_tick.is_some() {
            self.next_tick = Some(now + self.period);
        }
    }

    /// Number of whole periods that elapsed since the last tick
    pub fn poll(&mut self, now: Instant) -> u32 {
        let Some(next) = self.next_tick else {
            return 0;
        };
        if now < next || self.period.is_zero() {
            return 0;
        }
        let behind = now.duration_since(next);
        let ticks = (behind.as_nanos() / self.period.as_nanos()) as u32 + 1;
        self.next_tick = Some(next + self.period * ticks);
        ticks
    }

    /// When the next tick is due, for `ControlFlow::WaitUntil`
    pub fn deadline(&self) -> Option<Instant> {
        self.next_tick
    }
}
