//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Frame ingest requests per second, across all views
pub const INGEST_RATE_LIMIT: u32 = 50;

/// Control messages per second on one render socket
pub const SOCKET_RATE_LIMIT: u32 = 10;

/// Per-socket rate limiter state
#[derive(Clone)]
pub struct SocketRateLimiter {
    limiter: Arc<Limiter>,
}

impl SocketRateLimiter {
    pub fn new() -> Self {
        Self {
            limiter: create_limiter(SOCKET_RATE_LIMIT),
        }
    }

    /// Check if a control message is allowed (returns true if allowed)
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for SocketRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
