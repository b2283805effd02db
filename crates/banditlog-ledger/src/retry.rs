use crate::remote::RemoteError;
use rand::Rng;
use std::time::Duration;

/// Longest single backoff sleep.
const MAX_DELAY: Duration = Duration::from_secs(300);

/// Source of blocking sleeps. Swapped for a recording fake in tests.
pub trait Clock {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Why a retried operation gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// Every attempt failed transiently.
    Exhausted { attempts: u32, last: RemoteError },
    /// A structural failure stopped the loop before the budget was spent.
    Fatal { attempt: u32, error: RemoteError },
}

/// Exponential backoff with bounded additive jitter.
///
/// Attempt `n` (0-based) that fails transiently is followed by a sleep of
/// `base_backoff * 2^n + U(0, jitter_ratio * base_backoff)`, unless it was the last one.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(500),
            jitter_ratio: 0.35,
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay after failed attempt `attempt`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_backoff.saturating_mul(factor).min(MAX_DELAY)
    }

    /// Upper bound of the random jitter added to every delay.
    pub fn max_jitter(&self) -> Duration {
        if self.jitter_ratio <= 0.0 || !self.jitter_ratio.is_finite() {
            return Duration::ZERO;
        }
        self.base_backoff.mul_f64(self.jitter_ratio)
    }

    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let max_jitter = self.max_jitter();
        let jitter = if max_jitter.is_zero() {
            Duration::ZERO
        } else {
            max_jitter.mul_f64(rng.gen_range(0.0..=1.0))
        };
        self.base_delay(attempt) + jitter
    }

    /// Run `op` until it succeeds, fails structurally, or the attempt budget is spent.
    /// `op` receives the 0-based attempt number.
    pub fn run<T, C, R, F>(&self, clock: &C, rng: &mut R, mut op: F) -> Result<T, RetryError>
    where
        C: Clock + ?Sized,
        R: Rng + ?Sized,
        F: FnMut(u32) -> Result<T, RemoteError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(error) if !error.is_transient() => {
                    tracing::error!(attempt, error = %error, "structural remote error, not retrying");
                    return Err(RetryError::Fatal { attempt, error });
                }
                Err(error) if attempt + 1 >= attempts => {
                    tracing::warn!(attempts, error = %error, "retry budget exhausted");
                    return Err(RetryError::Exhausted {
                        attempts,
                        last: error,
                    });
                }
                Err(error) => {
                    let delay = self.delay(attempt, rng);
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient remote error, backing off"
                    );
                    clock.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClock;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff: Duration::from_millis(100),
            jitter_ratio: 0.35,
        }
    }

    #[test]
    fn base_delay_doubles_and_caps() {
        let p = policy(3);
        assert_eq!(p.base_delay(0), Duration::from_millis(100));
        assert_eq!(p.base_delay(1), Duration::from_millis(200));
        assert_eq!(p.base_delay(3), Duration::from_millis(800));
        assert_eq!(p.base_delay(40), MAX_DELAY);
    }

    #[test]
    fn jitter_is_bounded() {
        let p = policy(3);
        let mut rng = StdRng::seed_from_u64(11);
        for attempt in 0..4 {
            for _ in 0..50 {
                let d = p.delay(attempt, &mut rng);
                assert!(d >= p.base_delay(attempt));
                assert!(d <= p.base_delay(attempt) + Duration::from_millis(35));
            }
        }
    }

    #[test]
    fn zero_jitter_is_exact() {
        let p = RetryPolicy {
            jitter_ratio: 0.0,
            ..policy(3)
        };
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(p.delay(2, &mut rng), Duration::from_millis(400));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let clock = FakeClock::default();
        let mut rng = StdRng::seed_from_u64(1);
        let result = policy(4).run(&clock, &mut rng, |attempt| {
            if attempt < 2 {
                Err(RemoteError::Transient("429".into()))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result, Ok(2));
        assert_eq!(clock.sleeps().len(), 2);
    }

    #[test]
    fn exhausts_exact_budget_without_trailing_sleep() {
        let clock = FakeClock::default();
        let mut rng = StdRng::seed_from_u64(2);
        let mut calls = 0;
        let result: Result<(), _> = policy(4).run(&clock, &mut rng, |_| {
            calls += 1;
            Err(RemoteError::Transient("timeout".into()))
        });
        assert_eq!(calls, 4);
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 4,
                last: RemoteError::Transient("timeout".into())
            })
        );
        let sleeps = clock.sleeps();
        assert_eq!(sleeps.len(), 3);
        for (attempt, slept) in sleeps.iter().enumerate() {
            assert!(*slept >= Duration::from_millis(100) * 2u32.pow(attempt as u32));
        }
    }

    #[test]
    fn structural_error_stops_immediately() {
        let clock = FakeClock::default();
        let mut rng = StdRng::seed_from_u64(3);
        let mut calls = 0;
        let result: Result<(), _> = policy(5).run(&clock, &mut rng, |_| {
            calls += 1;
            Err(RemoteError::Structural("403 permission denied".into()))
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(RetryError::Fatal { attempt: 0, .. })));
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let clock = FakeClock::default();
        let mut rng = StdRng::seed_from_u64(4);
        let mut calls = 0;
        let _: Result<(), _> = policy(0).run(&clock, &mut rng, |_| {
            calls += 1;
            Err(RemoteError::Transient("x".into()))
        });
        assert_eq!(calls, 1);
        assert!(clock.sleeps().is_empty());
    }
}
