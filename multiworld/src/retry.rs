use std::time::Duration;

/// Bounded exponential backoff between failed upload attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    next: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        let max = max.max(initial);
        // Also rejects NaN.
        let multiplier = if multiplier >= 1.0 { multiplier } else { 1.0 };
        Self {
            initial,
            max,
            multiplier,
            next: initial,
            failures: 0,
        }
    }

    /// Delay to wait after the failure just observed.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.failures += 1;
        let grown_us = (self.next.as_micros() as f64 * self.multiplier).round();
        self.next = if grown_us >= self.max.as_micros() as f64 {
            self.max
        } else {
            Duration::from_micros(grown_us as u64)
        };
        delay
    }

    /// Consecutive failures since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
        self.failures = 0;
    }
}
