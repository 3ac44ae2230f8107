//! Fixed spacing between page navigations.

use governor::{Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Waits so that consecutive navigations are at least `delay` apart.
///
/// The first navigation goes through immediately. A zero delay disables
/// the throttle entirely.
#[derive(Clone)]
pub struct NavigationThrottle {
    limiter: Option<Arc<DirectRateLimiter>>,
}

impl NavigationThrottle {
    pub fn new(delay: Duration) -> Self {
        let limiter = Quota::with_period(delay).map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self { limiter }
    }

    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_zero_delay_is_disabled() {
        let throttle = NavigationThrottle::new(Duration::ZERO);
        assert!(!throttle.is_enabled());

        let start = Instant::now();
        for _ in 0..10 {
            throttle.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_spaces_navigations() {
        let throttle = NavigationThrottle::new(Duration::from_millis(40));

        let start = Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;

        assert!(start.elapsed() >= Duration::from_millis(70));
    }
}
