//! Rate-limited call gate.
//!
//! Requests are serialized per route bucket. After every response the bucket
//! remembers how many calls remain in the current window and when it resets;
//! a bucket with no calls left waits for the reset before sending again. A
//! 429 answer is retried after the server-provided delay, up to a bounded
//! number of attempts.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use tether_core::{ApiError, ApiResult};

/// Rate-limit headers observed on a response.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateLimitInfo {
    /// `X-RateLimit-Remaining`.
    pub remaining: Option<u32>,
    /// `X-RateLimit-Reset-After`.
    pub reset_after: Option<Duration>,
}

/// Result of a single attempt through the gate.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The call completed.
    Done(T),
    /// The server answered 429; retry after the given delay.
    RetryAfter(Duration),
}

#[derive(Debug, Default)]
struct Bucket {
    remaining: Option<u32>,
    reset_at: Option<Instant>,
}

impl Bucket {
    fn update(&mut self, info: RateLimitInfo) {
        if let Some(remaining) = info.remaining {
            self.remaining = Some(remaining);
        }
        if let Some(reset_after) = info.reset_after {
            self.reset_at = Some(Instant::now() + reset_after);
        }
    }

    /// Returns the instant to wait for before the next call, if exhausted.
    fn wait_until(&self) -> Option<Instant> {
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset_at)) if reset_at > Instant::now() => Some(reset_at),
            _ => None,
        }
    }
}

/// Serializes calls per route and honours rate-limit headers.
#[derive(Debug)]
pub struct CallGate {
    buckets: Mutex<HashMap<String, Arc<tokio::sync::Mutex<Bucket>>>>,
    max_attempts: u32,
}

impl CallGate {
    /// Creates a gate that gives up after `max_attempts` rate-limited tries.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns the bucket for `route`, dropping idle buckets on the way.
    ///
    /// Interaction routes are unique per interaction, so a bucket nobody
    /// holds and that is not waiting for a reset is discarded.
    fn bucket(&self, route: &str) -> Arc<tokio::sync::Mutex<Bucket>> {
        let mut buckets = self.buckets.lock();
        buckets.retain(|_, bucket| !is_idle(bucket));
        buckets.entry(route.to_string()).or_default().clone()
    }

    /// Runs `attempt` through the bucket for `route`.
    ///
    /// Calls on the same route run one at a time; different routes proceed
    /// independently.
    pub async fn call<T, F, Fut>(&self, route: &str, mut attempt: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<(Attempt<T>, RateLimitInfo)>>,
    {
        let bucket = self.bucket(route);
        let mut bucket = bucket.lock().await;

        for attempt_no in 1..=self.max_attempts {
            if let Some(until) = bucket.wait_until() {
                debug!(route = %route, "Bucket exhausted, waiting for reset");
                sleep_until(until).await;
                bucket.remaining = None;
            }

            let (outcome, info) = attempt().await?;
            bucket.update(info);

            match outcome {
                Attempt::Done(value) => return Ok(value),
                Attempt::RetryAfter(delay) => {
                    warn!(route = %route, attempt = attempt_no, delay = ?delay, "Rate limited");
                    if attempt_no < self.max_attempts {
                        sleep_until(Instant::now() + delay).await;
                    }
                }
            }
        }

        Err(ApiError::RateLimited {
            route: route.to_string(),
            attempts: self.max_attempts,
        })
    }
}

fn is_idle(bucket: &Arc<tokio::sync::Mutex<Bucket>>) -> bool {
    if Arc::strong_count(bucket) > 1 {
        return false;
    }
    match bucket.try_lock() {
        Ok(state) => state.wait_until().is_none(),
        Err(_) => false,
    }
}

impl Default for CallGate {
    fn default() -> Self {
        Self::new(3)
    }
}
