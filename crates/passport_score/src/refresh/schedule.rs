use std::time::Duration;

const MAX_ATTEMPTS: u32 = 30;
const INITIAL_DELAY_MS: u64 = 1_000;
const DELAY_STEP_MS: u64 = 500;
const MAX_DELAY_MS: u64 = 10_000;

/// Bounds for one refresh run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshConfig {
    /// Upper bound on score fetches per run, forced rescores included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub delay_step: Duration,
    pub max_delay: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            delay_step: Duration::from_millis(DELAY_STEP_MS),
            max_delay: Duration::from_millis(MAX_DELAY_MS),
        }
    }
}

/// Waits between polls of a processing score: the initial delay, growing by
/// one step per poll until it reaches the cap. Never decreases, never resets.
#[derive(Clone, Debug)]
pub struct DelaySchedule {
    current: Duration,
    step: Duration,
    max: Duration,
}

impl DelaySchedule {
    pub fn new(config: &RefreshConfig) -> Self {
        Self {
            current: config.initial_delay.min(config.max_delay),
            step: config.delay_step,
            max: config.max_delay,
        }
    }
}

impl Iterator for DelaySchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.current;
        if self.current < self.max {
            self.current = (self.current + self.step).min(self.max);
        }
        Some(delay)
    }
}
