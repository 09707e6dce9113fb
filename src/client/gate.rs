//! Minimum-interval gate in front of every outbound generation call

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Admission gate shared by every generation attempt routed through it.
///
/// A gate instance is the unit of sharing: clients built with clones of the
/// same `Arc` are throttled together, clients with separate gates are not.
#[async_trait]
pub trait CallGate: Send + Sync {
    /// Wait until the next outbound call may start
    async fn wait_turn(&self);
}

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>;

/// Spaces consecutive calls at least `min_interval` apart
#[derive(Clone)]
pub struct IntervalGate {
    limiter: Option<SharedRateLimiter>,
    min_interval: Duration,
}

impl IntervalGate {
    pub fn new(min_interval: Duration) -> Self {
        // A zero period yields no quota, which means no throttling
        let limiter = Quota::with_period(min_interval).map(|quota| Arc::new(RateLimiter::direct(quota)));

        Self {
            limiter,
            min_interval,
        }
    }
}

#[async_trait]
impl CallGate for IntervalGate {
    async fn wait_turn(&self) {
        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                debug!(
                    min_interval_ms = self.min_interval.as_millis() as u64,
                    "Waiting for call gate"
                );
                limiter.until_ready().await;
            }
        }
    }
}

/// Gate that never waits
#[derive(Debug, Clone, Copy, Default)]
pub struct Unthrottled;

#[async_trait]
impl CallGate for Unthrottled {
    async fn wait_turn(&self) {}
}
