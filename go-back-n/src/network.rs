//! The seam between the protocol state machines and whatever drives them.
//!
//! The sender and receiver never perform I/O or read a clock themselves.
//! Every side effect goes through a [`Network`]: the discrete-event
//! [`crate::simulator`], the UDP [`crate::connection`] endpoints (via
//! [`Outbox`]), or a test harness.

use std::fmt;

use crate::packet::{Message, Packet};

/// Which peer an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The sending side.
    A,
    /// The receiving side.
    B,
}

impl Role {
    /// The opposite end of the link.
    pub fn peer(self) -> Role {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::A => write!(f, "A"),
            Role::B => write!(f, "B"),
        }
    }
}

/// Services a peer consumes from its environment.
pub trait Network {
    /// Best-effort transmission towards the other peer.  May be dropped or
    /// corrupted in transit, but never reordered.
    fn udt_send(&mut self, from: Role, packet: Packet);

    /// Arm `role`'s single-shot timer, replacing it if already running.
    fn start_timer(&mut self, role: Role, duration: f64);

    /// Cancel `role`'s timer; a no-op when it is not running.
    fn stop_timer(&mut self, role: Role);

    /// Monotonic time used for RTT sampling.
    fn clock(&self) -> f64;

    /// Hand a validated, in-order message to the application.
    fn deliver(&mut self, role: Role, message: Message);
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// A side effect requested by a peer.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Transmit(Packet),
    StartTimer(f64),
    StopTimer,
    Deliver(Message),
}

/// A [`Network`] that records every requested action in order.
///
/// Drivers that cannot perform effects synchronously (the async UDP
/// endpoints) run a peer against an `Outbox`, then drain and execute the
/// actions.  Tests use it to inspect exactly what a peer did.
#[derive(Debug, Default)]
pub struct Outbox {
    now: f64,
    actions: Vec<(Role, Action)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value subsequent [`Network::clock`] calls return.
    pub fn set_clock(&mut self, now: f64) {
        self.now = now;
    }

    pub fn actions(&self) -> &[(Role, Action)] {
        &self.actions
    }

    /// Remove and return every recorded action.
    pub fn drain(&mut self) -> Vec<(Role, Action)> {
        std::mem::take(&mut self.actions)
    }

    /// Packets transmitted so far, in order.
    pub fn transmitted(&self) -> Vec<Packet> {
        self.actions
            .iter()
            .filter_map(|(_, a)| match a {
                Action::Transmit(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// Messages delivered so far, in order.
    pub fn delivered(&self) -> Vec<Message> {
        self.actions
            .iter()
            .filter_map(|(_, a)| match a {
                Action::Deliver(m) => Some(*m),
                _ => None,
            })
            .collect()
    }
}

impl Network for Outbox {
    fn udt_send(&mut self, from: Role, packet: Packet) {
        self.actions.push((from, Action::Transmit(packet)));
    }

    fn start_timer(&mut self, role: Role, duration: f64) {
        self.actions.push((role, Action::StartTimer(duration)));
    }

    fn stop_timer(&mut self, role: Role) {
        self.actions.push((role, Action::StopTimer));
    }

    fn clock(&self) -> f64 {
        self.now
    }

    fn deliver(&mut self, role: Role, message: Message) {
        self.actions.push((role, Action::Deliver(message)));
    }
}
