use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};

/// Token-bucket rate limiter shared by concurrent callers.
///
/// Semantics:
/// - the bucket starts full (`burst` tokens) and refills at `per_second`
/// - [`RateLimiter::acquire`] reserves its tokens up front, then sleeps off
///   any deficit outside the lock, so waiters are served in arrival order
///
/// ```
/// use placelens_runtime::RateLimiter;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let limiter = RateLimiter::per_minute(60);
/// limiter.acquire(1).await; // first call is served from the burst
/// # });
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    per_second: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    // Negative while callers are waiting on reserved tokens.
    tokens: f64,
    last: Instant,
}

const MIN_RATE: f64 = 1e-3;

impl RateLimiter {
    pub fn new(per_second: f64, burst: u32) -> Self {
        let per_second = if per_second.is_finite() {
            per_second.max(MIN_RATE)
        } else {
            MIN_RATE
        };
        let burst = burst.max(1) as f64;
        Self {
            per_second,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }

    /// Steady `n` requests per minute with a burst of one.
    pub fn per_minute(n: u32) -> Self {
        Self::new(n as f64 / 60.0, 1)
    }

    /// Wait until `cost` tokens are available, then consume them.
    pub async fn acquire(&self, cost: u32) {
        let wait = self.reserve(cost as f64, Instant::now()).await;
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate.acquire.waiting");
            sleep(wait).await;
        }
    }

    async fn reserve(&self, need: f64, now: Instant) -> Duration {
        let mut st = self.state.lock().await;
        let dt = now.saturating_duration_since(st.last).as_secs_f64();
        st.last = now;
        st.tokens = (st.tokens + dt * self.per_second).min(self.burst);
        st.tokens -= need;
        if st.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-st.tokens / self.per_second)
        }
    }
}
