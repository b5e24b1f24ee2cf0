//! Seeded fault injection for an unreliable link.
//!
//! Real networks drop and damage packets.  To exercise the reliability
//! mechanisms reproducibly, [`FaultModel`] decides the fate of each packet
//! from a seeded RNG:
//!
//! | Fault       | Description                                            |
//! |-------------|--------------------------------------------------------|
//! | Loss        | Drop the packet with probability `loss_rate`.          |
//! | Corruption  | Flip one random bit of the encoded packet with         |
//! |             | probability `corrupt_rate`.                            |
//!
//! A single bit flip always changes exactly one checksummed field (or the
//! checksum itself) by a power of two, so the additive checksum always
//! detects it.
//!
//! The link never reorders; ordering is the driver's responsibility.

use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;

use crate::config::ConfigError;
use crate::packet::{Packet, WIRE_LEN};

/// Probabilities for the fault model.  Both are in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub seed: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        // No faults by default: a transparent pass-through.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            seed: 0,
        }
    }
}

impl FaultConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(ConfigError::InvalidSimulator("loss_rate must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.corrupt_rate) {
            return Err(ConfigError::InvalidSimulator("corrupt_rate must be in [0, 1]"));
        }
        Ok(())
    }
}

/// What happened to a packet on the way through the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Delivered(Packet),
    Corrupted(Packet),
    Lost,
}

/// Seeded per-packet fault decisions.
#[derive(Debug)]
pub struct FaultModel {
    config: FaultConfig,
    rng: StdRng,
}

impl FaultModel {
    pub fn new(config: FaultConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
        })
    }

    /// A model that never drops or damages anything.
    pub fn reliable() -> Self {
        Self {
            config: FaultConfig::default(),
            rng: StdRng::seed_from_u64(0),
        }
    }

    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    /// Decide the fate of one packet.
    pub fn apply(&mut self, packet: Packet) -> Fate {
        if self.config.loss_rate > 0.0 && self.rng.random::<f64>() < self.config.loss_rate {
            return Fate::Lost;
        }
        if self.config.corrupt_rate > 0.0 && self.rng.random::<f64>() < self.config.corrupt_rate {
            return Fate::Corrupted(self.flip_bit(packet));
        }
        Fate::Delivered(packet)
    }

    fn flip_bit(&mut self, packet: Packet) -> Packet {
        let mut bytes = packet.encode();
        let byte = self.rng.random_range(0..WIRE_LEN);
        let bit = self.rng.random_range(0..8u32);
        bytes[byte] ^= 1 << bit;
        match Packet::decode(&bytes) {
            Ok(damaged) => damaged,
            // Length is fixed, so decoding cannot fail.
            Err(_) => packet,
        }
    }
}
