//! Sender finite-state-machine types.
//!
//! Go-Back-N's sender has two states, distinguished by whether anything is
//! awaiting acknowledgement.  Keeping them as an explicit enum (rather than
//! inferring them from `base == next_seq`) makes the timer invariant
//! checkable on its own: the retransmission timer runs exactly when the
//! sender is [`SenderState::Outstanding`].
//!
//! ```text
//!            send (window was empty)
//!   IDLE ─────────────────────────────▶ OUTSTANDING ──┐
//!    ▲                                       │  ▲     │ send / partial ACK /
//!    │          ACK covers next_seq − 1      │  └─────┘ timeout
//!    └───────────────────────────────────────┘
//! ```

/// Sender state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SenderState {
    /// Nothing in flight; no timer running.
    Idle,
    /// At least one packet awaits acknowledgement; the timer is running.
    Outstanding {
        /// Clock reading at the first transmission of the oldest
        /// outstanding packet; the start of the next RTT sample.
        start_time: f64,
    },
}

impl SenderState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SenderState::Idle)
    }
}

impl Default for SenderState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SenderState::Idle => write!(f, "Idle"),
            SenderState::Outstanding { start_time } => {
                write!(f, "Outstanding(since {start_time:.3})")
            }
        }
    }
}
