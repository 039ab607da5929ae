use std::time::Duration;
use tokio::time::Instant;

/// Wall-clock allowance for one orchestration run.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    total: Duration,
}

impl Deadline {
    pub fn start(total: Duration) -> Self {
        Self {
            started: Instant::now(),
            total,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.total.saturating_sub(self.elapsed())
    }

    /// Per-call timeout capped by what is left of the run.
    pub fn stage_timeout(&self, per_call: Duration) -> Duration {
        per_call.min(self.remaining())
    }
}
