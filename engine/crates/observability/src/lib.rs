use tracing_subscriber::{fmt, EnvFilter};

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Summary of one settled run of the location upload task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadMetrics {
    /// Number of `collect_locations` calls issued, including failed ones.
    pub attempts: u32,
    /// Number of failed calls.
    pub failures: u32,
    /// Locations acknowledged by the server during this run.
    pub uploaded: usize,
    pub duration_us: u128,
}

impl UploadMetrics {
    pub fn record_attempt(&mut self, uploaded: Option<usize>) {
        self.attempts += 1;
        match uploaded {
            Some(count) => self.uploaded += count,
            None => self.failures += 1,
        }
    }

    pub fn log(&self) {
        if self.failures > 0 {
            tracing::warn!(
                attempts = self.attempts,
                failures = self.failures,
                uploaded = self.uploaded,
                duration_us = self.duration_us,
                "location upload settled after {} failed attempt(s)",
                self.failures
            );
        } else {
            tracing::info!(
                attempts = self.attempts,
                uploaded = self.uploaded,
                duration_us = self.duration_us,
                "location upload settled"
            );
        }
    }
}
