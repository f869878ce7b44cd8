//! Sliding-window rate limiter: at most `limit` dispatches per `delta`.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct State {
    counter: usize,
    checkpoint: Instant,
}

/// Gates dispatch to at most `limit` calls to [`RateLimiter::acquire`] per
/// `delta` window, sleeping callers that arrive once the window's quota is
/// spent until the next window opens.
pub struct RateLimiter {
    limit: usize,
    delta: Duration,
    state: Mutex<State>,
}

impl RateLimiter {
    /// Creates a limiter allowing `limit` acquisitions every `delta`. A
    /// `limit` of zero disables throttling entirely.
    pub fn new(limit: usize, delta: Duration) -> Self {
        RateLimiter {
            limit,
            delta,
            state: Mutex::new(State { counter: 0, checkpoint: Instant::now() }),
        }
    }

    /// Blocks until a slot in the current (or a future) window is free.
    pub async fn acquire(&self) {
        if self.limit == 0 {
            return;
        }
        loop {
            let wait = {
                let mut state = self.state.lock().expect("rate limiter mutex poisoned");
                let elapsed = state.checkpoint.elapsed();
                if elapsed >= self.delta {
                    state.counter = 0;
                    state.checkpoint = Instant::now();
                }
                if state.counter < self.limit {
                    state.counter += 1;
                    None
                } else {
                    Some(self.delta.saturating_sub(elapsed).max(Duration::from_millis(1)))
                }
            };
            match wait {
                None => return,
                Some(duration) => crate::runtime::sleep(duration).await,
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unlimited_rate_never_blocks_synchronously() {
        let limiter = RateLimiter::new(0, Duration::from_millis(1000));
        assert_eq!(limiter.limit, 0);
    }
}
