//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Un-jittered delay before the attempt following `attempt`.
///
/// `attempt` is 1-based: the delay after the first failure is `base`.
pub fn exponential_delay(attempt: u32, base: Duration, max: Option<Duration>) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential_base = 2u32.saturating_pow(attempt - 1);
    let delay = base.saturating_mul(exponential_base);
    match max {
        Some(cap) => delay.min(cap),
        None => delay,
    }
}

/// Scale `delay` by a uniform factor in `[1 - jitter, 1 + jitter]`.
pub fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    let jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };
    if jitter == 0.0 || delay.is_zero() {
        return delay;
    }

    let factor = rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter));
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// Calculate the jittered backoff delay after a failed `attempt`.
pub fn calculate_backoff(
    attempt: u32,
    base: Duration,
    max: Option<Duration>,
    jitter: f64,
) -> Duration {
    apply_jitter(exponential_delay(attempt, base, max), jitter)
}
