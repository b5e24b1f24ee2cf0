//! Round-trip-time estimation.
//!
//! [`RttEstimator`] keeps an exponentially weighted moving average of RTT
//! samples:
//!
//!   `EstimatedRTT = (1 − α)·EstimatedRTT + α·SampleRTT`
//!
//! The estimate doubles as the retransmission timeout.  There is no variance
//! term and no exponential back-off; a timeout restarts the timer with the
//! same estimate.

/// Which acknowledgements are allowed to produce an RTT sample.
///
/// A late ACK for a packet that was sent more than once cannot be attributed
/// to either transmission, so a sample taken from it is ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RttSampling {
    /// Sample on every advancing ACK, retransmitted or not.
    #[default]
    EveryAck,
    /// Skip the sample when the timed packet was retransmitted (Karn).
    SkipRetransmitted,
}

impl RttSampling {
    /// Whether a sample for a packet transmitted `tx_count` times is taken.
    pub fn accepts(self, tx_count: u32) -> bool {
        match self {
            RttSampling::EveryAck => true,
            RttSampling::SkipRetransmitted => tx_count <= 1,
        }
    }
}

/// EWMA round-trip-time estimator.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    estimated: f64,
    alpha: f64,
    samples: u64,
}

impl RttEstimator {
    /// Start from `initial` with sample weight `alpha`.
    pub fn new(initial: f64, alpha: f64) -> Self {
        Self {
            estimated: initial,
            alpha,
            samples: 0,
        }
    }

    /// Fold one sample into the estimate.
    ///
    /// Negative or non-finite samples are dropped; they can only come from a
    /// clock that went backwards.
    pub fn update(&mut self, sample: f64) {
        if !sample.is_finite() || sample < 0.0 {
            log::warn!("[rtt] ignoring invalid sample {sample}");
            return;
        }
        self.estimated = (1.0 - self.alpha) * self.estimated + self.alpha * sample;
        self.samples += 1;
    }

    /// Current smoothed RTT.
    pub fn estimated(&self) -> f64 {
        self.estimated
    }

    /// Duration to arm the retransmission timer with.
    pub fn timeout(&self) -> f64 {
        self.estimated
    }

    /// Number of samples folded in so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }
}
