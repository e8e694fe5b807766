//! Token-bucket limiter, one per external dependency.
//!
//! Callers block only their own worker thread while waiting for a token, so a
//! slow host paces its own requests without stalling unrelated pairs.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct TokenBucket {
    name: &'static str,
    capacity: f64,
    /// Tokens per second; `<= 0` disables limiting.
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(name: &'static str, refill_per_sec: f64, capacity: u32) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            name,
            capacity,
            refill_per_sec,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn unlimited(name: &'static str) -> Self {
        Self::new(name, 0.0, 1)
    }

    pub fn is_unlimited(&self) -> bool {
        self.refill_per_sec <= 0.0
    }

    /// Take a token, sleeping until one is available.
    pub fn acquire(&self) {
        loop {
            match self.take_or_wait() {
                None => return,
                Some(wait) => {
                    tracing::trace!(limiter = self.name, ?wait, "Rate limited, waiting");
                    std::thread::sleep(wait);
                }
            }
        }
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.take_or_wait().is_none()
    }

    /// `None` when a token was taken, otherwise how long until the next one.
    fn take_or_wait(&self) -> Option<Duration> {
        if self.is_unlimited() {
            return None;
        }

        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            None
        } else {
            let missing = 1.0 - state.tokens;
            Some(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_never_blocks() {
        let bucket = TokenBucket::unlimited("test");
        for _ in 0..1_000 {
            assert!(bucket.try_acquire());
        }
    }

    #[test]
    fn capacity_is_exhausted_then_refills() {
        let bucket = TokenBucket::new("test", 50.0, 2);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());

        std::thread::sleep(Duration::from_millis(60));
        assert!(bucket.try_acquire());
    }

    #[test]
    fn acquire_waits_for_refill() {
        let bucket = TokenBucket::new("test", 20.0, 1);
        bucket.acquire();
        let started = Instant::now();
        bucket.acquire();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let bucket = TokenBucket::new("test", 1.0, 0);
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }
}
