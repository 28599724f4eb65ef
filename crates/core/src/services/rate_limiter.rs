use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, Duration, Instant};

use crate::errors::CoreError;
use crate::models::settings::RateLimitSettings;

/// Client-side queue in front of the quote APIs.
///
/// Callers wait for a permit (bounded concurrency), then for the minimum
/// spacing since the previous request to elapse. Free tiers are small
/// (Alpha Vantage: 5 requests/minute), so every provider call goes
/// through here.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    /// When the next request may start
    next_slot: Mutex<Instant>,
    min_delay: Duration,
}

impl RateLimiter {
    /// `requests_per_minute` of 0 is treated as 1; `max_concurrent` of 0 as 1.
    pub fn new(max_concurrent: usize, requests_per_minute: u32) -> Self {
        let per_minute = requests_per_minute.max(1) as u64;
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            next_slot: Mutex::new(Instant::now()),
            min_delay: Duration::from_millis(60_000 / per_minute),
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(settings.max_concurrent, settings.requests_per_minute)
    }

    /// Wait for a slot. The returned guard releases the concurrency permit on drop.
    pub async fn acquire(&self) -> Result<RateLimitGuard, CoreError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CoreError::RateLimited("request queue closed".into()))?;

        // Reserve the slot under the lock, sleep outside it.
        let wait_until = {
            let mut next = self.next_slot.lock();
            let now = Instant::now();
            let slot = if *next > now { *next } else { now };
            *next = slot + self.min_delay;
            slot
        };

        let now = Instant::now();
        if wait_until > now {
            tracing::debug!(wait_ms = (wait_until - now).as_millis() as u64, "quote request queued");
            sleep(wait_until - now).await;
        }

        Ok(RateLimitGuard { _permit: permit })
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_settings(&RateLimitSettings::default())
    }
}

/// Holds a concurrency permit until dropped.
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
}
