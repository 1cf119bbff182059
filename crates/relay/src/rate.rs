use std::time::{Duration, Instant};

/// Leaky-rate gate: lets one unit of work through per `1 / rate` seconds.
#[derive(Debug, Clone)]
pub struct RateGate {
    interval: Duration,
    last: Option<Instant>,
}

/// Time between units of work at `rate` per second, `None` when `rate` is
/// not a finite positive number or its interval does not fit a `Duration`.
pub fn rate_interval(rate: f32) -> Option<Duration> {
    if !rate.is_finite() || rate <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f32(1.0 / rate).ok()
}

impl RateGate {
    /// Non-positive rates never throttle; rates too small to represent never
    /// reopen after the first call.
    pub fn new(rate: f32) -> Self {
        let interval = if rate > 0.0 {
            rate_interval(rate).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        };
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` and records `now` if a full interval has passed since
    /// the last accepted call. The first call is always accepted.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Frames counted over a rolling one-second window.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window_start: Instant,
    count: u32,
    current: u32,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
            current: 0,
        }
    }

    /// Count one frame. Returns the new rate when a window just closed.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        self.count += 1;
        if now.saturating_duration_since(self.window_start) >= Duration::from_secs(1) {
            self.current = self.count;
            self.count = 0;
            self.window_start = now;
            return Some(self.current);
        }
        None
    }

    pub fn current(&self) -> u32 {
        self.current
    }
}
