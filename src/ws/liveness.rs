//! Heartbeat timing and per-connection read deadline.
//!
//! Every connection pings its peer on a fixed interval and is dropped if no
//! frame of any kind (data, ping, or pong) arrives within the read
//! deadline. A silent connection is therefore gone at most one deadline
//! after its last observed activity.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::error::RelayError;

/// Heartbeat settings shared by all connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    interval: Duration,
    deadline: Duration,
}

impl Heartbeat {
    /// Creates heartbeat settings.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if `interval` is zero or the
    /// read deadline is not longer than the ping interval, which would drop
    /// healthy connections between two pings.
    pub fn new(interval: Duration, deadline: Duration) -> Result<Self, RelayError> {
        if interval.is_zero() {
            return Err(RelayError::Config(
                "ping interval must be positive".to_string(),
            ));
        }
        if deadline <= interval {
            return Err(RelayError::Config(format!(
                "read deadline ({deadline:?}) must exceed ping interval ({interval:?})"
            )));
        }
        Ok(Self { interval, deadline })
    }

    /// Time between two pings.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Longest tolerated silence.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Ping ticker whose first tick fires one interval from now.
    #[must_use]
    pub fn ticker(&self) -> Interval {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            deadline: Duration::from_secs(60),
        }
    }
}

/// Read deadline of one connection, pushed back on every inbound frame.
#[derive(Debug, Clone, Copy)]
pub struct ReadDeadline {
    window: Duration,
    last_seen: Instant,
}

impl ReadDeadline {
    /// Starts the clock now.
    #[must_use]
    pub fn start(window: Duration) -> Self {
        Self {
            window,
            last_seen: Instant::now(),
        }
    }

    /// Records inbound activity.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Instant at which the connection is considered dead.
    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.last_seen + self.window
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn rejects_deadline_not_above_interval() {
        let secs = Duration::from_secs;
        assert!(Heartbeat::new(secs(30), secs(60)).is_ok());
        assert!(Heartbeat::new(secs(30), secs(30)).is_err());
        assert!(Heartbeat::new(Duration::ZERO, secs(30)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires_without_activity() {
        let mut clock = ReadDeadline::start(Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(Instant::now() < clock.expires_at());

        clock.touch();
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(Instant::now() < clock.expires_at());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(Instant::now() >= clock.expires_at());
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_skips_immediate_tick() {
        let Ok(heartbeat) = Heartbeat::new(Duration::from_secs(30), Duration::from_secs(60)) else {
            panic!("valid heartbeat");
        };
        let start = Instant::now();
        let mut ticker = heartbeat.ticker();
        ticker.tick().await;
        assert!(Instant::now() - start >= Duration::from_secs(30));
    }
}
