//! `go-back-n`: the sender and receiver halves of a Go-Back-N sliding-window
//! protocol, with a deterministic simulator and a UDP transport.
//!
//! # Architecture
//!
//! ```text
//!   application A                               application B
//!        │ Message                                   ▲ Message
//!  ┌─────▼──────┐        data packets         ┌──────┴─────┐
//!  │   Sender   │────────────────────────────▶│  Receiver  │
//!  │ (window,   │◀────────────────────────────│ (expected  │
//!  │  RTT, FSM) │     cumulative ACKs         │   seqnum)  │
//!  └─────┬──────┘                             └──────┬─────┘
//!        │            impl Network                   │
//!  ┌─────▼───────────────────────────────────────────▼─────┐
//!  │  Simulator (discrete events)  │  Outbox + Socket (UDP) │
//!  └───────────────────────────────────────────────────────┘
//! ```
//!
//! The state machines never touch a clock or a socket directly; everything
//! they need from the outside world goes through the [`network::Network`]
//! trait.
//!
//! - [`checksum`]: additive packet checksum
//! - [`packet`]: `Message`, `Packet`, wire format
//! - [`config`]: protocol parameters and their validation
//! - [`rtt`]: EWMA round-trip estimator
//! - [`window`]: ring buffer of unacknowledged packets
//! - [`state`]: sender finite-state machine
//! - [`network`]: the environment seam, plus a recording `Outbox`
//! - [`gbn_sender`]: side A
//! - [`gbn_receiver`]: side B
//! - [`fault`]: seeded loss and corruption
//! - [`simulator`]: deterministic discrete-event run of A and B
//! - [`timer`]: async retransmit timer
//! - [`socket`]: async UDP socket abstraction
//! - [`connection`]: A and B driven over UDP

pub mod checksum;
pub mod config;
pub mod connection;
pub mod fault;
pub mod gbn_receiver;
pub mod gbn_sender;
pub mod network;
pub mod packet;
pub mod rtt;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;
pub mod window;

pub use config::{ConfigError, ProtocolConfig};
pub use gbn_receiver::Receiver;
pub use gbn_sender::Sender;
pub use network::{Network, Role};
pub use packet::{Message, Packet};
pub use simulator::{SimulationReport, Simulator, SimulatorConfig};
