//! Deterministic discrete-event network simulator.
//!
//! [`Simulator`] plays the role of the application layer, the unreliable
//! channel, the clock and the timer service around one [`Sender`] and one
//! [`Receiver`]:
//!
//! - The application on side A produces `messages` messages, spaced by a
//!   random gap averaging `message_interval`.  A message the sender refuses
//!   (window full) waits in a backlog and is offered again after every ACK.
//! - Every packet handed to the channel passes through a seeded
//!   [`FaultModel`] (loss, corruption) and then arrives after
//!   `delay + U[0, jitter)` time units.  Arrivals on a direction are never
//!   earlier than the previous arrival on that direction, so the channel
//!   preserves order.
//! - Each role has one single-shot timer; restarting it invalidates the
//!   pending expiry.
//!
//! The same configuration and seed always produce the same run.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::fmt;

use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;

use crate::config::{ConfigError, ProtocolConfig};
use crate::fault::{Fate, FaultConfig, FaultModel};
use crate::gbn_receiver::{Receiver, ReceiverStats};
use crate::gbn_sender::{Sender, SenderStats};
use crate::network::{Network, Role};
use crate::packet::{Message, Packet};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Parameters of one simulated session.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Number of messages the application on side A produces.
    pub messages: usize,
    /// Mean gap between two application messages; `0.0` produces them all
    /// at time zero.
    pub message_interval: f64,
    /// Minimum one-way propagation delay.
    pub delay: f64,
    /// Extra uniformly distributed one-way delay in `[0, jitter)`.
    pub jitter: f64,
    /// Loss and corruption probabilities plus the RNG seed.
    pub faults: FaultConfig,
    /// Simulated time after which the run is abandoned.
    pub max_time: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            messages: 20,
            message_interval: 50.0,
            delay: 1.0,
            jitter: 9.0,
            faults: FaultConfig::default(),
            max_time: 1_000_000.0,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.faults.validate()?;
        if !(self.message_interval.is_finite() && self.message_interval >= 0.0) {
            return Err(ConfigError::InvalidSimulator("message_interval must be >= 0"));
        }
        if !(self.delay.is_finite() && self.delay >= 0.0) {
            return Err(ConfigError::InvalidSimulator("delay must be >= 0"));
        }
        if !(self.jitter.is_finite() && self.jitter >= 0.0) {
            return Err(ConfigError::InvalidSimulator("jitter must be >= 0"));
        }
        if !(self.max_time > 0.0) {
            return Err(ConfigError::InvalidSimulator("max_time must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum EventKind {
    /// The application on side A produces its next message.
    FromApp,
    /// A packet reaches `to`.
    Arrival { to: Role, packet: Packet },
    /// `role`'s timer expires, unless restarted or stopped since.
    Timeout { role: Role, generation: u64 },
}

#[derive(Debug)]
struct Event {
    time: f64,
    /// Scheduling order; breaks ties so equal-time events run FIFO.
    order: u64,
    kind: EventKind,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    // Reversed so the max-heap pops the earliest event first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

// ---------------------------------------------------------------------------
// Link: the Network both peers see
// ---------------------------------------------------------------------------

/// Counters describing what the channel did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Packets handed to the channel by either side.
    pub sent: u64,
    pub lost: u64,
    pub corrupted: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct TimerSlot {
    generation: u64,
    armed: bool,
}

struct Link {
    now: f64,
    events: BinaryHeap<Event>,
    next_order: u64,
    faults: FaultModel,
    rng: StdRng,
    delay: f64,
    jitter: f64,
    /// Latest scheduled arrival per destination, indexed by [`slot`].
    last_arrival: [f64; 2],
    timers: [TimerSlot; 2],
    delivered: Vec<Message>,
    stats: LinkStats,
}

fn slot(role: Role) -> usize {
    match role {
        Role::A => 0,
        Role::B => 1,
    }
}

impl Link {
    fn schedule(&mut self, time: f64, kind: EventKind) {
        let order = self.next_order;
        self.next_order += 1;
        self.events.push(Event { time, order, kind });
    }

    fn transit_delay(&mut self) -> f64 {
        if self.jitter > 0.0 {
            self.delay + self.rng.random::<f64>() * self.jitter
        } else {
            self.delay
        }
    }
}

impl Network for Link {
    fn udt_send(&mut self, from: Role, packet: Packet) {
        self.stats.sent += 1;
        let to = from.peer();
        let packet = match self.faults.apply(packet) {
            Fate::Lost => {
                self.stats.lost += 1;
                log::debug!("[sim] t={:.3} {from}→{to} lost: {packet}", self.now);
                return;
            }
            Fate::Corrupted(damaged) => {
                self.stats.corrupted += 1;
                log::debug!("[sim] t={:.3} {from}→{to} corrupted: {damaged}", self.now);
                damaged
            }
            Fate::Delivered(p) => p,
        };

        let arrival = (self.now + self.transit_delay()).max(self.last_arrival[slot(to)]);
        self.last_arrival[slot(to)] = arrival;
        self.schedule(arrival, EventKind::Arrival { to, packet });
    }

    fn start_timer(&mut self, role: Role, duration: f64) {
        let timer = &mut self.timers[slot(role)];
        timer.generation += 1;
        timer.armed = true;
        let generation = timer.generation;
        self.schedule(self.now + duration, EventKind::Timeout { role, generation });
    }

    fn stop_timer(&mut self, role: Role) {
        let timer = &mut self.timers[slot(role)];
        if !timer.armed {
            log::warn!("[sim] t={:.3} stop_timer({role}) with no timer running", self.now);
        }
        timer.generation += 1;
        timer.armed = false;
    }

    fn clock(&self) -> f64 {
        self.now
    }

    fn deliver(&mut self, role: Role, message: Message) {
        log::debug!("[sim] t={:.3} {role} delivers \"{message}\"", self.now);
        self.delivered.push(message);
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of a simulated session.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Messages produced by the application on side A.
    pub generated: usize,
    /// Messages delivered on side B, in delivery order.
    pub delivered: Vec<Message>,
    /// `true` when every message was delivered and acknowledged.
    pub completed: bool,
    /// Simulated time at which the run stopped.
    pub end_time: f64,
    pub final_base: i32,
    pub final_expected_seq: i32,
    pub estimated_rtt: f64,
    pub sender: SenderStats,
    pub receiver: ReceiverStats,
    pub link: LinkStats,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} after t={:.3}: {}/{} messages delivered",
            if self.completed { "completed" } else { "stopped" },
            self.end_time,
            self.delivered.len(),
            self.generated
        )?;
        writeln!(
            f,
            "sender:   base={} transmissions={} retransmissions={} timeouts={} rejected={} estimated_rtt={:.3}",
            self.final_base,
            self.sender.transmissions,
            self.sender.retransmissions,
            self.sender.timeouts,
            self.sender.rejected,
            self.estimated_rtt
        )?;
        writeln!(
            f,
            "receiver: expected_seq={} corrupt={} out_of_order={} reacks={}",
            self.final_expected_seq,
            self.receiver.corrupt,
            self.receiver.out_of_order,
            self.receiver.reacks
        )?;
        write!(
            f,
            "link:     sent={} lost={} corrupted={}",
            self.link.sent, self.link.lost, self.link.corrupted
        )
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// One simulated Go-Back-N session.
pub struct Simulator {
    config: SimulatorConfig,
    sender: Sender,
    receiver: Receiver,
    link: Link,
    /// Messages produced but not yet accepted by the sender.
    backlog: VecDeque<Message>,
    generated: usize,
}

impl Simulator {
    pub fn new(config: SimulatorConfig, protocol: &ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let sender = Sender::with_config(protocol)?;
        let faults = FaultModel::new(config.faults)?;

        let mut link = Link {
            now: 0.0,
            events: BinaryHeap::new(),
            next_order: 0,
            faults,
            // Independent stream so delays do not shift fault decisions.
            rng: StdRng::seed_from_u64(config.faults.seed.wrapping_add(1)),
            delay: config.delay,
            jitter: config.jitter,
            last_arrival: [0.0; 2],
            timers: [TimerSlot::default(); 2],
            delivered: Vec::new(),
            stats: LinkStats::default(),
        };
        if config.messages > 0 {
            link.schedule(0.0, EventKind::FromApp);
        }

        Ok(Self {
            config,
            sender,
            receiver: Receiver::new(),
            link,
            backlog: VecDeque::new(),
            generated: 0,
        })
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn receiver(&self) -> &Receiver {
        &self.receiver
    }

    pub fn now(&self) -> f64 {
        self.link.now
    }

    /// Messages delivered on side B so far.
    pub fn delivered(&self) -> &[Message] {
        &self.link.delivered
    }

    /// `true` once every message has been produced, delivered and
    /// acknowledged.
    pub fn is_complete(&self) -> bool {
        self.generated == self.config.messages
            && self.backlog.is_empty()
            && self.sender.state().is_idle()
            && self.link.delivered.len() == self.config.messages
    }

    /// Process the next event.  Returns `false` when nothing is left to do
    /// or `max_time` has passed.
    pub fn step(&mut self) -> bool {
        let Some(event) = self.link.events.pop() else {
            return false;
        };
        if event.time > self.config.max_time {
            log::warn!("[sim] max_time {} reached; abandoning run", self.config.max_time);
            return false;
        }
        self.link.now = event.time;

        match event.kind {
            EventKind::FromApp => self.on_app_message(),
            EventKind::Arrival { to: Role::A, packet } => {
                self.sender.on_packet(&packet, &mut self.link);
                self.pump_backlog();
            }
            EventKind::Arrival { to: Role::B, packet } => {
                self.receiver.on_packet(&packet, &mut self.link);
            }
            EventKind::Timeout { role, generation } => {
                let timer = self.link.timers[slot(role)];
                if timer.armed && timer.generation == generation {
                    self.link.timers[slot(role)].armed = false;
                    match role {
                        Role::A => self.sender.on_timeout(&mut self.link),
                        Role::B => log::debug!("[sim] B timeout ignored"),
                    }
                }
            }
        }
        true
    }

    /// Run until the session completes, stalls, or hits `max_time`.
    pub fn run(&mut self) -> SimulationReport {
        while !self.is_complete() && self.step() {}
        self.report()
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            generated: self.generated,
            delivered: self.link.delivered.clone(),
            completed: self.is_complete(),
            end_time: self.link.now,
            final_base: self.sender.base(),
            final_expected_seq: self.receiver.expected_seq(),
            estimated_rtt: self.sender.estimated_rtt(),
            sender: self.sender.stats().clone(),
            receiver: self.receiver.stats().clone(),
            link: self.link.stats.clone(),
        }
    }

    fn on_app_message(&mut self) {
        let message = Message::filled(b'a' + (self.generated % 26) as u8);
        self.generated += 1;
        self.backlog.push_back(message);
        self.pump_backlog();

        if self.generated < self.config.messages {
            let gap = if self.config.message_interval > 0.0 {
                self.config.message_interval * 2.0 * self.link.rng.random::<f64>()
            } else {
                0.0
            };
            let at = self.link.now + gap;
            self.link.schedule(at, EventKind::FromApp);
        }
    }

    /// Offer queued messages to the sender until it refuses one.
    fn pump_backlog(&mut self) {
        while let Some(message) = self.backlog.front() {
            if !self.sender.send(message, &mut self.link) {
                break;
            }
            self.backlog.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reliable(messages: usize) -> SimulatorConfig {
        SimulatorConfig {
            messages,
            message_interval: 0.0,
            delay: 5.0,
            jitter: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn events_pop_in_time_then_fifo_order() {
        let mut heap = BinaryHeap::new();
        for (time, order) in [(2.0, 0), (1.0, 1), (1.0, 2), (0.5, 3)] {
            heap.push(Event {
                time,
                order,
                kind: EventKind::FromApp,
            });
        }
        let popped: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|e| e.order)).collect();
        assert_eq!(popped, vec![3, 1, 2, 0]);
    }

    #[test]
    fn zero_messages_completes_immediately() {
        let mut sim = Simulator::new(reliable(0), &ProtocolConfig::default()).unwrap();
        let report = sim.run();
        assert!(report.completed);
        assert!(report.delivered.is_empty());
        assert_eq!(report.link.sent, 0);
    }

    #[test]
    fn single_message_round_trip() {
        let mut sim = Simulator::new(reliable(1), &ProtocolConfig::default()).unwrap();
        let report = sim.run();
        assert!(report.completed);
        assert_eq!(report.delivered, vec![Message::filled(b'a')]);
        assert_eq!(report.end_time, 10.0);
        assert_eq!(report.final_base, 2);
        // 0.875 * 250 + 0.125 * 10
        assert!((report.estimated_rtt - 220.0).abs() < 1e-9);
    }

    #[test]
    fn restarted_timer_invalidates_pending_expiry() {
        let mut sim = Simulator::new(reliable(0), &ProtocolConfig::default()).unwrap();
        sim.link.start_timer(Role::A, 5.0);
        sim.link.start_timer(Role::A, 50.0);
        let pending: Vec<f64> = sim.link.events.iter().map(|e| e.time).collect();
        assert_eq!(pending.len(), 2);

        // Only the second expiry is live.
        assert!(sim.step());
        assert!(sim.link.timers[slot(Role::A)].armed);
        assert!(sim.step());
        assert!(!sim.link.timers[slot(Role::A)].armed);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimulatorConfig {
            delay: -1.0,
            ..Default::default()
        };
        assert!(Simulator::new(config, &ProtocolConfig::default()).is_err());
    }

    #[test]
    fn report_display_mentions_counts() {
        let mut sim = Simulator::new(reliable(3), &ProtocolConfig::default()).unwrap();
        let text = sim.run().to_string();
        assert!(text.starts_with("completed"));
        assert!(text.contains("3/3 messages delivered"));
    }
}
