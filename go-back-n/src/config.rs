//! Protocol parameters shared by both peers.

use std::fmt;

use crate::rtt::RttSampling;

/// Default number of packets that may be outstanding at once.
pub const WINDOW_SIZE: usize = 10;

/// Default EWMA weight given to a new RTT sample.
pub const ALPHA: f64 = 0.125;

/// Default initial RTT guess, in simulation time units (milliseconds over UDP).
pub const INITIAL_RTT: f64 = 250.0;

/// Tunable protocol parameters.
///
/// Built with [`Default`] and the `with_*` methods, then checked with
/// [`ProtocolConfig::validate`] before a state machine is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolConfig {
    /// Maximum number of unacknowledged packets (N).
    pub window_size: usize,
    /// Weight of a new sample in the RTT moving average.
    pub alpha: f64,
    /// RTT estimate used before the first sample, and the first timeout.
    pub initial_rtt: f64,
    /// Which acknowledgements may produce an RTT sample.
    pub rtt_sampling: RttSampling,
}

impl ProtocolConfig {
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_initial_rtt(mut self, initial_rtt: f64) -> Self {
        self.initial_rtt = initial_rtt;
        self
    }

    pub fn with_rtt_sampling(mut self, rtt_sampling: RttSampling) -> Self {
        self.rtt_sampling = rtt_sampling;
        self
    }

    /// Reject parameter combinations the state machines cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 || self.window_size > i32::MAX as usize {
            return Err(ConfigError::InvalidWindowSize(self.window_size));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(ConfigError::InvalidAlpha(self.alpha));
        }
        if !(self.initial_rtt.is_finite() && self.initial_rtt > 0.0) {
            return Err(ConfigError::InvalidInitialRtt(self.initial_rtt));
        }
        Ok(())
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            alpha: ALPHA,
            initial_rtt: INITIAL_RTT,
            rtt_sampling: RttSampling::EveryAck,
        }
    }
}

/// Errors raised by configuration validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidWindowSize(usize),
    InvalidAlpha(f64),
    InvalidInitialRtt(f64),
    /// A fault or delay parameter of the simulator is out of range.
    InvalidSimulator(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidWindowSize(n) => {
                write!(f, "window size must be at least 1, got {n}")
            }
            ConfigError::InvalidAlpha(a) => write!(f, "alpha must be in (0, 1], got {a}"),
            ConfigError::InvalidInitialRtt(r) => {
                write!(f, "initial RTT must be positive and finite, got {r}")
            }
            ConfigError::InvalidSimulator(s) => write!(f, "invalid simulator configuration: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}
