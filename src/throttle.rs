//! Run-global throttle for a rate-limited external service.
//!
//! Caps the number of in-flight calls and, optionally, spaces call starts so
//! the request rate stays under a per-minute budget. One throttle is shared
//! by every worker that calls the same service, independent of how many
//! adapters run at once.

use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::{Instant, sleep_until};
use tracing::trace;

#[derive(Debug)]
pub struct Throttle {
    name: &'static str,
    in_flight: Semaphore,
    min_interval: Option<Duration>,
    next_start: Mutex<Option<Instant>>,
}

impl Throttle {
    /// `max_in_flight` is clamped to at least one. `requests_per_minute` of
    /// `None` or zero disables spacing.
    pub fn new(name: &'static str, max_in_flight: usize, requests_per_minute: Option<u32>) -> Self {
        let min_interval = requests_per_minute
            .filter(|rpm| *rpm > 0)
            .map(|rpm| Duration::from_secs(60) / rpm);
        Self {
            name,
            in_flight: Semaphore::new(max_in_flight.max(1)),
            min_interval,
            next_start: Mutex::new(None),
        }
    }

    /// Wait for a slot. The call counts as in flight until the permit drops.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        // The semaphore is never closed, so acquire cannot fail.
        let permit = match self.in_flight.acquire().await {
            Ok(p) => p,
            Err(_) => unreachable!("throttle semaphore closed"),
        };

        if let Some(interval) = self.min_interval {
            let mut next = self.next_start.lock().await;
            let now = Instant::now();
            let start = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(start + interval);
            drop(next);
            if start > now {
                trace!(throttle = self.name, wait_ms = (start - now).as_millis(), "spacing call");
                sleep_until(start).await;
            }
        }
        permit
    }

    pub fn available(&self) -> usize {
        self.in_flight.available_permits()
    }
}
