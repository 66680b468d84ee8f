//! Token-bucket rate limiter.

use std::sync::Mutex;
use std::time::Duration;

use datareader_core::{DataError, Result};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Token bucket shared by every request of one client.
///
/// Holds up to `burst` tokens and refills at `rate` tokens per second. A
/// waiter reserves its token up front (the balance may go negative) and
/// sleeps until the reservation matures, so over any window of length `T`
/// at most `burst + rate * T` requests are granted. Grant order is not
/// guaranteed to follow arrival order.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    updated: Instant,
}

impl RateLimiter {
    /// Create a limiter granting `rate` requests per second with bursts of `burst`.
    ///
    /// A `rate` of zero or less never blocks. `burst` is raised to at least one.
    #[must_use]
    pub fn new(rate: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                updated: Instant::now(),
            }),
        }
    }

    /// A limiter that never blocks.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(0.0, 1)
    }

    /// Requests per second; zero or less means unlimited.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Returns true if this limiter never blocks.
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        self.rate <= 0.0
    }

    /// Waits until a token is available.
    ///
    /// # Errors
    /// Returns [`DataError::Cancelled`] if `cancel` fires first; the reserved
    /// token is handed back, so a cancelled wait grants nothing.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(DataError::Cancelled);
        }
        if self.is_unlimited() {
            return Ok(());
        }

        let ready_at = self.reserve()?;
        let now = Instant::now();
        if ready_at <= now {
            return Ok(());
        }

        trace!(wait_ms = (ready_at - now).as_millis() as u64, "Rate limiting");
        tokio::select! {
            () = sleep_until(ready_at) => Ok(()),
            () = cancel.cancelled() => {
                self.release()?;
                Err(DataError::Cancelled)
            }
        }
    }

    /// Takes one token and returns the instant at which it becomes usable.
    fn reserve(&self) -> Result<Instant> {
        let mut bucket = self
            .bucket
            .lock()
            .map_err(|e| DataError::Other(e.to_string()))?;

        let now = Instant::now();
        self.refill(&mut bucket, now);
        bucket.tokens -= 1.0;

        if bucket.tokens >= 0.0 {
            Ok(now)
        } else {
            Ok(now + Duration::from_secs_f64(-bucket.tokens / self.rate))
        }
    }

    /// Returns a reserved token that was never used.
    fn release(&self) -> Result<()> {
        let mut bucket = self
            .bucket
            .lock()
            .map_err(|e| DataError::Other(e.to_string()))?;
        let now = Instant::now();
        self.refill(&mut bucket, now);
        bucket.tokens = (bucket.tokens + 1.0).min(self.burst);
        Ok(())
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.updated).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.updated = now;
    }
}
