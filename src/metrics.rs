use serde::{Deserialize, Serialize};

/// Agent runtime counters, included in the `status` response.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Metrics {
    pub uptime_sec: u64,
    pub programs_received: u64,
    pub directives_applied: u64,
    pub directives_failed: u64,
    pub frames_ticked: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_program(&mut self) {
        self.programs_received += 1;
    }

    pub fn record_applied(&mut self) {
        self.directives_applied += 1;
    }

    pub fn record_failed(&mut self) {
        self.directives_failed += 1;
    }

    pub fn record_frame(&mut self) {
        self.frames_ticked += 1;
    }

    /// Share of directives that applied cleanly, as a percentage.
    pub fn apply_rate(&self) -> f64 {
        let total = self.directives_applied + self.directives_failed;
        if total == 0 {
            return 100.0;
        }
        (self.directives_applied as f64 / total as f64) * 100.0
    }

    /// Increment uptime (typically called once per frame-clock second)
    pub fn increment_uptime(&mut self, seconds: u64) {
        self.uptime_sec += seconds;
    }
}
