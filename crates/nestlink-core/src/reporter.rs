// Operator error reporting with a cooldown.
//
// A Nest outage or a revoked login fails every poll; only the first failure
// after a quiet period is reported, later ones are logged at debug level
// until the cooldown has been ticked away or a refresh succeeds.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ErrorReporter {
    cooldown: Duration,
    remaining: Duration,
}

impl ErrorReporter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            remaining: Duration::ZERO,
        }
    }

    /// Count down by one poll interval.
    pub fn tick(&mut self, elapsed: Duration) {
        self.remaining = self.remaining.saturating_sub(elapsed);
    }

    /// A refresh failed. Returns `true` if it should be reported.
    pub fn on_failure(&mut self) -> bool {
        if self.remaining.is_zero() {
            self.remaining = self.cooldown;
            true
        } else {
            false
        }
    }

    pub fn on_success(&mut self) {
        self.remaining = Duration::ZERO;
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_secs(300);

    #[test]
    fn first_failure_is_reported_then_suppressed() {
        let mut reporter = ErrorReporter::new(Duration::from_secs(900));
        assert!(reporter.on_failure());
        reporter.tick(POLL);
        assert!(!reporter.on_failure());
        reporter.tick(POLL);
        assert!(!reporter.on_failure());
        reporter.tick(POLL);
        assert!(reporter.on_failure());
    }

    #[test]
    fn success_rearms_immediately() {
        let mut reporter = ErrorReporter::new(Duration::from_secs(12 * 3600));
        assert!(reporter.on_failure());
        reporter.on_success();
        assert_eq!(reporter.remaining(), Duration::ZERO);
        assert!(reporter.on_failure());
    }

    #[test]
    fn tick_never_underflows() {
        let mut reporter = ErrorReporter::new(Duration::from_secs(60));
        reporter.tick(POLL);
        assert_eq!(reporter.remaining(), Duration::ZERO);
    }
}
