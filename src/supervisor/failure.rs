use std::time::{Duration, Instant};

/// Two failures further apart than this are unrelated: the count restarts at 1.
pub const MIN_FAIL_INTERVAL: Duration = Duration::from_secs(5);
/// Consecutive rapid failures tolerated before the supervisor backs off.
pub const MAX_FAIL_COUNT: u32 = 3;
/// Cooldown after the failure threshold is reached; no restart is attempted
/// until it has elapsed.
pub const BACKOFF_WAIT: Duration = Duration::from_secs(10);

/// Counts consecutive worker failures within a time window and gates the
/// restart/backoff decision. Mutated only by the supervisor loop; no I/O.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    min_fail_interval: Duration,
    max_fail_count: u32,
    backoff_wait: Duration,
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            last_failure_at: None,
            min_fail_interval: MIN_FAIL_INTERVAL,
            max_fail_count: MAX_FAIL_COUNT,
            backoff_wait: BACKOFF_WAIT,
        }
    }
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_fail_interval(mut self, min_fail_interval: Duration) -> Self {
        self.min_fail_interval = min_fail_interval;
        self
    }

    pub fn with_max_fail_count(mut self, max_fail_count: u32) -> Self {
        self.max_fail_count = max_fail_count;
        self
    }

    pub fn with_backoff_wait(mut self, backoff_wait: Duration) -> Self {
        self.backoff_wait = backoff_wait;
        self
    }

    /// Counts a failure at `now`. A failure within `min_fail_interval` of the
    /// previous one continues the streak, a later one starts a new streak.
    pub fn record_failure(&mut self, now: Instant) {
        match self.last_failure_at {
            Some(previous) if now.duration_since(previous) <= self.min_fail_interval => {
                self.consecutive_failures += 1;
            }
            _ => self.consecutive_failures = 1,
        }
        self.last_failure_at = Some(now);
    }

    pub fn should_enter_backoff(&self) -> bool {
        self.consecutive_failures >= self.max_fail_count
    }

    /// Whether the cooldown window since the last failure is over.
    pub fn backoff_elapsed(&self, now: Instant) -> bool {
        self.last_failure_at
            .map(|previous| now.duration_since(previous) > self.backoff_wait)
            .unwrap_or(true)
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.last_failure_at = None;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn backoff_wait(&self) -> Duration {
        self.backoff_wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rapid_failures_continue_the_streak() {
        let mut tracker = FailureTracker::new();
        let t0 = Instant::now();

        tracker.record_failure(t0);
        tracker.record_failure(t0 + Duration::from_secs(2));
        tracker.record_failure(t0 + Duration::from_secs(4));

        assert_eq!(3, tracker.consecutive_failures());
        assert!(tracker.should_enter_backoff());
    }

    #[test]
    fn a_spaced_failure_starts_a_new_streak() {
        let mut tracker = FailureTracker::new();
        let t0 = Instant::now();

        tracker.record_failure(t0);
        tracker.record_failure(t0 + Duration::from_secs(2));
        assert_eq!(2, tracker.consecutive_failures());

        // More than min_fail_interval after the previous failure.
        tracker.record_failure(t0 + Duration::from_secs(8));
        assert_eq!(1, tracker.consecutive_failures());
        assert!(!tracker.should_enter_backoff());
    }

    #[test]
    fn a_failure_on_the_interval_boundary_still_counts() {
        let mut tracker = FailureTracker::new();
        let t0 = Instant::now();

        tracker.record_failure(t0);
        tracker.record_failure(t0 + MIN_FAIL_INTERVAL);

        assert_eq!(2, tracker.consecutive_failures());
    }

    #[test]
    fn backoff_starts_at_the_configured_threshold() {
        let mut tracker = FailureTracker::new().with_max_fail_count(2);
        let t0 = Instant::now();

        tracker.record_failure(t0);
        assert!(!tracker.should_enter_backoff());

        tracker.record_failure(t0 + Duration::from_secs(1));
        assert!(tracker.should_enter_backoff());
    }

    #[test]
    fn backoff_elapses_strictly_after_the_wait() {
        let mut tracker = FailureTracker::new();
        let t0 = Instant::now();
        tracker.record_failure(t0);

        assert!(!tracker.backoff_elapsed(t0 + BACKOFF_WAIT));
        assert!(tracker.backoff_elapsed(t0 + BACKOFF_WAIT + Duration::from_millis(1)));
    }

    #[test]
    fn backoff_is_elapsed_when_nothing_ever_failed() {
        let tracker = FailureTracker::new();
        assert!(tracker.backoff_elapsed(Instant::now()));
    }

    #[test]
    fn reset_clears_the_streak() {
        let mut tracker = FailureTracker::new();
        let t0 = Instant::now();
        tracker.record_failure(t0);
        tracker.record_failure(t0 + Duration::from_secs(1));
        tracker.record_failure(t0 + Duration::from_secs(2));
        assert!(tracker.should_enter_backoff());

        tracker.reset();
        assert_eq!(0, tracker.consecutive_failures());
        assert!(!tracker.should_enter_backoff());
        assert!(tracker.backoff_elapsed(t0 + Duration::from_secs(2)));
    }
}
