use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Global minimum-spacing limiter for image calls.
///
/// Callers queue on a fair (FIFO) async mutex; each holder waits until
/// `min_interval` has passed since the previous dispatch, records its own
/// dispatch time and releases. Dropping a waiting `acquire` future leaves the
/// queue without consuming a slot.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Wait for this caller's turn to dispatch.
    pub async fn acquire(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.min_interval).await;
        }
        *last = Some(Instant::now());
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}
