//! Exponential backoff with bounded jitter.

use std::time::Duration;

use rand::Rng;

/// Computes wait durations for retryable quota failures.
///
/// For attempt `n` (0-based) the delay is `base * 2^n + U[0, jitter]`. The
/// jitter spreads retries from concurrent callers so they do not hammer a
/// shared quota in lockstep, while the doubling floor keeps the expected wait
/// strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    base: Duration,
    jitter: Duration,
}

impl Default for BackoffSchedule {
    /// Observed production values: one minute base, thirty second jitter
    /// ceiling.
    fn default() -> Self {
        Self {
            base: Duration::from_secs(60),
            jitter: Duration::from_secs(30),
        }
    }
}

impl BackoffSchedule {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn jitter(&self) -> Duration {
        self.jitter
    }

    /// Delay before retry `attempt`, using the thread-local RNG.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    /// Delay before retry `attempt` with an injected randomness source.
    ///
    /// The RNG is the only impure input; a fixed RNG makes the schedule fully
    /// deterministic for tests.
    pub fn delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let floor = self.base.saturating_mul(2u32.saturating_pow(attempt));
        if self.jitter.is_zero() {
            return floor;
        }
        let jitter_ms = rng.gen_range(0..=self.jitter.as_millis() as u64);
        floor + Duration::from_millis(jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn delay_stays_within_jitter_band() {
        let schedule = BackoffSchedule::default();
        let mut rng = rand::thread_rng();

        for attempt in 0..6 {
            let floor = Duration::from_secs(60) * 2u32.pow(attempt);
            let ceiling = floor + Duration::from_secs(30);
            for _ in 0..200 {
                let delay = schedule.delay_with(attempt, &mut rng);
                assert!(delay >= floor, "attempt {attempt}: {delay:?} < {floor:?}");
                assert!(delay <= ceiling, "attempt {attempt}: {delay:?} > {ceiling:?}");
            }
        }
    }

    #[test]
    fn floor_doubles_each_attempt() {
        let schedule = BackoffSchedule::new(Duration::from_secs(60), Duration::ZERO);
        let mut rng = StepRng::new(0, 0);

        assert_eq!(
            schedule.delay_with(0, &mut rng),
            Duration::from_secs(60)
        );
        assert_eq!(
            schedule.delay_with(1, &mut rng),
            Duration::from_secs(120)
        );
        assert_eq!(
            schedule.delay_with(2, &mut rng),
            Duration::from_secs(240)
        );
        assert_eq!(
            schedule.delay_with(4, &mut rng),
            Duration::from_secs(960)
        );
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let schedule = BackoffSchedule::new(Duration::from_millis(250), Duration::ZERO);
        let a = schedule.delay(3);
        let b = schedule.delay(3);
        assert_eq!(a, b);
        assert_eq!(a, Duration::from_millis(2000));
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let schedule = BackoffSchedule::default();
        let mut rng = StepRng::new(0, 0);
        // Saturates instead of panicking.
        let _ = schedule.delay_with(64, &mut rng);
    }
}
