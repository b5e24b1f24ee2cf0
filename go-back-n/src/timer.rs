//! Single-shot retransmit timer for the async UDP endpoints.
//!
//! The protocol core only ever asks for "start the timer for `d`" and "stop
//! the timer".  [`RetransmitTimer`] maps those requests onto one pinned
//! `tokio::time::Sleep` that is reset in place, so at most one expiry per
//! endpoint is ever pending.
//!
//! Protocol time is a plain `f64`; over UDP one unit is one millisecond
//! (see [`units_to_duration`]).

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// How far in the future a disarmed timer parks its deadline.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 3600);

/// Convert protocol time units (milliseconds) into a [`Duration`].
pub fn units_to_duration(units: f64) -> Duration {
    if units.is_finite() && units > 0.0 {
        Duration::from_secs_f64(units / 1000.0)
    } else {
        Duration::ZERO
    }
}

/// Convert an elapsed [`Duration`] into protocol time units (milliseconds).
pub fn duration_to_units(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// A re-armable single-shot timer.
///
/// Use in `tokio::select!` as
/// `_ = timer.expired(), if timer.is_armed() => { ... }`.
#[derive(Debug)]
pub struct RetransmitTimer {
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl Default for RetransmitTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl RetransmitTimer {
    /// Create a disarmed timer.
    pub fn new() -> Self {
        Self {
            sleep: Box::pin(tokio::time::sleep(FAR_FUTURE)),
            armed: false,
        }
    }

    /// Arm (or re-arm) the timer to fire `after` from now.
    pub fn arm(&mut self, after: Duration) {
        self.sleep.as_mut().reset(Instant::now() + after);
        self.armed = true;
    }

    /// Cancel a pending expiry.
    pub fn cancel(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + FAR_FUTURE);
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Wait for the deadline, then disarm.
    ///
    /// Only meaningful while armed; a disarmed timer waits for a year.
    pub async fn expired(&mut self) {
        (&mut self.sleep).await;
        self.armed = false;
    }
}
