//! Per-service token bucket admission control.
//!
//! Tokens accrue continuously at `refill_rate` per second up to `capacity`;
//! each admitted request spends one. A rejection is a local decision and
//! says nothing about the health of the service behind it.

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::RateLimitConfig;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn refill(&mut self, capacity: f64, refill_rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        self.refill(capacity, refill_rate);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token bucket limiter owned by one registered service.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_rate: f64,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = f64::from(config.capacity);
        Self {
            capacity,
            refill_rate: config.refill_rate,
            bucket: Mutex::new(TokenBucket::new(capacity)),
        }
    }

    /// Spend one token if available.
    pub fn try_acquire(&self) -> bool {
        self.bucket
            .lock()
            .try_acquire(self.capacity, self.refill_rate)
    }

    /// Tokens available right now, refilled up to the current instant.
    pub fn available_tokens(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        bucket.refill(self.capacity, self.refill_rate);
        bucket.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(capacity: u32, refill_rate: f64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            capacity,
            refill_rate,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_bounded_by_capacity() {
        let limiter = limiter(4, 1.0);
        for _ in 0..4 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_over_time() {
        let limiter = limiter(10, 2.0);
        while limiter.try_acquire() {}

        tokio::time::advance(Duration::from_millis(1500)).await;
        let mut admitted = 0;
        while limiter.try_acquire() {
            admitted += 1;
        }
        assert_eq!(admitted, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_capped_at_capacity() {
        let limiter = limiter(2, 5.0);
        assert!(limiter.try_acquire());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(limiter.available_tokens(), 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_does_not_spend() {
        let limiter = limiter(1, 1.0);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire());
    }
}
