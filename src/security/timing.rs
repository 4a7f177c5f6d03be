//! Timing attack protection for credential checks
//!
//! Failed logins are padded to a floor duration so that an unknown username,
//! a wrong password and a storage miss all take about as long to answer.

use std::time::{Duration, Instant};

use crate::constants::DEFAULT_AUTH_MIN_DURATION_MS;

/// Sleep until `min_duration` has elapsed since `start_time`
pub async fn add_auth_delay(start_time: Instant, min_duration: Duration) {
    let elapsed = start_time.elapsed();
    if elapsed < min_duration {
        tokio::time::sleep(min_duration - elapsed).await;
    }
}

/// Authentication timing helper
#[derive(Debug)]
pub struct AuthTimer {
    start: Instant,
    min_duration: Duration,
}

impl AuthTimer {
    /// Start a timer with the given floor
    pub fn new(min_duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            min_duration,
        }
    }

    /// Wait until minimum duration has elapsed
    pub async fn wait(self) {
        add_auth_delay(self.start, self.min_duration).await;
    }
}

impl Default for AuthTimer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_AUTH_MIN_DURATION_MS))
    }
}
