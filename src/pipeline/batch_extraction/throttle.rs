//! Fixed-window request throttle.
//!
//! A window opens at the first invocation. Once `quota` invocations have been
//! made in it, the next one waits until the window duration has elapsed since
//! the window opened, then a fresh window starts. Failed invocations count.

use std::time::Duration;

use super::traits::Clock;

pub struct FixedWindowThrottle {
    quota: Option<u32>,
    window: Duration,
    window_start: Option<Duration>,
    calls_in_window: u32,
}

impl FixedWindowThrottle {
    pub fn new(quota: Option<u32>, window: Duration) -> Self {
        Self {
            quota,
            window,
            window_start: None,
            calls_in_window: 0,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None, Duration::ZERO)
    }

    /// Reserve one invocation, sleeping first if the window is used up.
    /// Returns how long it waited.
    pub fn acquire(&mut self, clock: &dyn Clock) -> Option<Duration> {
        let quota = self.quota?;

        let start = *self.window_start.get_or_insert_with(|| clock.now());
        let mut waited = None;

        if self.calls_in_window >= quota {
            let elapsed = clock.now().saturating_sub(start);
            if elapsed < self.window {
                let remaining = self.window - elapsed;
                tracing::info!(
                    quota,
                    wait_secs = remaining.as_secs_f64(),
                    "Request quota reached, waiting for window to pass"
                );
                clock.sleep(remaining);
                waited = Some(remaining);
            }
            self.window_start = Some(clock.now());
            self.calls_in_window = 0;
        }

        self.calls_in_window += 1;
        waited
    }
}
