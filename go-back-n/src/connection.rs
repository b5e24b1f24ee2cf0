//! Go-Back-N over a real UDP socket.
//!
//! # Architecture
//!
//! ```text
//!  Application                                  Application
//!      │ messages                                    ▲ messages
//!      ▼                                             │
//!  SenderEndpoint                              ReceiverEndpoint
//!    ├── Sender (window, RTT)                    ├── Receiver (expected_seq)
//!    ├── RetransmitTimer ◀── StartTimer/StopTimer│
//!    ├── Outbox  ── Transmit ─▶ Socket ─────────▶├── Outbox ── Deliver ──┘
//!    └── Socket  ◀──────────── ACKs ─────────────┴── Socket
//! ```
//!
//! The state machines are synchronous.  Each endpoint feeds them events
//! (application data, inbound packets, timer expiry) from a single
//! `tokio::select!` loop against an [`Outbox`], then carries out the
//! recorded actions: transmissions go to the socket, timer commands to the
//! [`RetransmitTimer`], deliveries to the application.
//!
//! Protocol time is measured in milliseconds since the endpoint was built.
//!
//! ```ignore
//! let socket = Socket::bind("127.0.0.1:0".parse()?).await?;
//! let mut tx = SenderEndpoint::new(socket, peer, &ProtocolConfig::default())?;
//! tx.send_all(messages).await?;
//! ```

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::{timeout, timeout_at, Instant};

use crate::config::{ConfigError, ProtocolConfig};
use crate::gbn_receiver::{Receiver, ReceiverStats};
use crate::gbn_sender::{Sender, SenderStats};
use crate::network::{Action, Outbox, Role};
use crate::packet::Message;
use crate::socket::{Socket, SocketError};
use crate::timer::{duration_to_units, units_to_duration, RetransmitTimer};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Consecutive timeouts without progress before the sender gives up.
///
/// The protocol itself retries forever; this bound belongs to the endpoint.
const MAX_CONSECUTIVE_TIMEOUTS: u32 = 50;

/// Floor for the retransmission timer; tokio timers tick in milliseconds.
const MIN_TIMEOUT: Duration = Duration::from_millis(2);

/// How long a receiver keeps re-acknowledging after its last expected
/// message, so a lost final ACK can still be repaired.
const DEFAULT_LINGER: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// ConnError
// ---------------------------------------------------------------------------

/// Errors surfaced by the UDP endpoints.
#[derive(Debug)]
pub enum ConnError {
    Socket(SocketError),
    Config(ConfigError),
    /// The retransmission timer fired too many times without the window
    /// moving.
    MaxRetriesExceeded,
    /// Nothing arrived within the receiver's idle timeout.
    IdleTimeout,
}

impl std::fmt::Display for ConnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnError::Socket(e) => write!(f, "{e}"),
            ConnError::Config(e) => write!(f, "{e}"),
            ConnError::MaxRetriesExceeded => {
                write!(f, "peer unresponsive after {MAX_CONSECUTIVE_TIMEOUTS} timeouts")
            }
            ConnError::IdleTimeout => write!(f, "no packet received before the idle timeout"),
        }
    }
}

impl std::error::Error for ConnError {}

impl From<SocketError> for ConnError {
    fn from(e: SocketError) -> Self {
        ConnError::Socket(e)
    }
}

impl From<ConfigError> for ConnError {
    fn from(e: ConfigError) -> Self {
        ConnError::Config(e)
    }
}

// ---------------------------------------------------------------------------
// SenderEndpoint
// ---------------------------------------------------------------------------

/// Drives a [`Sender`] over a UDP socket towards one peer.
pub struct SenderEndpoint {
    socket: Socket,
    peer: SocketAddr,
    sender: Sender,
    timer: RetransmitTimer,
    outbox: Outbox,
    epoch: Instant,
}

impl SenderEndpoint {
    pub fn new(socket: Socket, peer: SocketAddr, config: &ProtocolConfig) -> Result<Self, ConnError> {
        Ok(Self {
            socket,
            peer,
            sender: Sender::with_config(config)?,
            timer: RetransmitTimer::new(),
            outbox: Outbox::new(),
            epoch: Instant::now(),
        })
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    /// Send every message and wait until the last one is acknowledged.
    ///
    /// Messages the window cannot take yet are held back and offered again
    /// whenever an ACK arrives.
    pub async fn send_all<I>(&mut self, messages: I) -> Result<SenderStats, ConnError>
    where
        I: IntoIterator<Item = Message>,
    {
        let mut backlog: VecDeque<Message> = messages.into_iter().collect();
        let mut timeouts_without_progress = 0u32;
        log::info!("[udp] sending {} message(s) to {}", backlog.len(), self.peer);

        loop {
            while let Some(message) = backlog.front() {
                self.outbox.set_clock(self.now());
                if !self.sender.send(message, &mut self.outbox) {
                    break;
                }
                backlog.pop_front();
            }
            self.flush().await?;

            if backlog.is_empty() && self.sender.state().is_idle() {
                log::info!("[udp] all messages acknowledged");
                return Ok(self.sender.stats().clone());
            }

            tokio::select! {
                result = self.socket.recv_from() => {
                    let (packet, addr) = match result {
                        Ok(v) => v,
                        Err(SocketError::Packet(e)) => {
                            log::warn!("[udp] discarding datagram: {e}");
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    };
                    if addr != self.peer {
                        log::debug!("[udp] ignoring datagram from stranger {addr}");
                        continue;
                    }
                    let base = self.sender.base();
                    self.outbox.set_clock(self.now());
                    self.sender.on_packet(&packet, &mut self.outbox);
                    if self.sender.base() != base {
                        timeouts_without_progress = 0;
                    }
                }
                _ = self.timer.expired(), if self.timer.is_armed() => {
                    timeouts_without_progress += 1;
                    if timeouts_without_progress > MAX_CONSECUTIVE_TIMEOUTS {
                        return Err(ConnError::MaxRetriesExceeded);
                    }
                    self.outbox.set_clock(self.now());
                    self.sender.on_timeout(&mut self.outbox);
                }
            }
        }
    }

    /// Carry out everything the sender asked for.
    async fn flush(&mut self) -> Result<(), ConnError> {
        for (_, action) in self.outbox.drain() {
            match action {
                Action::Transmit(packet) => self.socket.send_to(&packet, self.peer).await?,
                Action::StartTimer(units) => {
                    self.timer.arm(units_to_duration(units).max(MIN_TIMEOUT))
                }
                Action::StopTimer => self.timer.cancel(),
                Action::Deliver(m) => log::warn!("[udp] sender asked to deliver \"{m}\""),
            }
        }
        Ok(())
    }

    fn now(&self) -> f64 {
        duration_to_units(self.epoch.elapsed())
    }
}

// ---------------------------------------------------------------------------
// ReceiverEndpoint
// ---------------------------------------------------------------------------

/// Drives a [`Receiver`] on a UDP socket.
///
/// The first sender heard from becomes the peer; datagrams from anyone else
/// are ignored.
pub struct ReceiverEndpoint {
    socket: Socket,
    receiver: Receiver,
    outbox: Outbox,
    peer: Option<SocketAddr>,
    linger: Duration,
    idle_timeout: Option<Duration>,
}

impl ReceiverEndpoint {
    pub fn new(socket: Socket) -> Self {
        Self {
            socket,
            receiver: Receiver::new(),
            outbox: Outbox::new(),
            peer: None,
            linger: DEFAULT_LINGER,
            idle_timeout: None,
        }
    }

    /// Time to keep answering retransmissions after the last expected message.
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Give up if nothing arrives for `idle` before the transfer completes.
    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout = Some(idle);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    pub fn stats(&self) -> &ReceiverStats {
        self.receiver.stats()
    }

    /// Receive exactly `count` messages, in order.
    pub async fn recv_messages(&mut self, count: usize) -> Result<Vec<Message>, ConnError> {
        let mut messages = Vec::with_capacity(count);
        self.receive(Some(count), |m| messages.push(*m)).await?;
        Ok(messages)
    }

    /// Serve the receiver, calling `on_message` for each in-order delivery.
    ///
    /// With `count = Some(n)` returns once the linger period after the `n`th
    /// delivery has passed.  While lingering, packets only draw the last ACK
    /// and nothing further is delivered.  With `None` serves until an error
    /// (or the idle timeout).  Returns the number of messages delivered.
    pub async fn receive<F>(&mut self, count: Option<usize>, mut on_message: F) -> Result<usize, ConnError>
    where
        F: FnMut(&Message),
    {
        let mut delivered = 0usize;
        let mut linger_until: Option<Instant> = None;

        loop {
            let done = count.is_some_and(|n| delivered >= n);
            if done && linger_until.is_none() {
                linger_until = Some(Instant::now() + self.linger);
            }

            let result = match (linger_until, self.idle_timeout) {
                (Some(deadline), _) => match timeout_at(deadline, self.socket.recv_from()).await {
                    Ok(r) => r,
                    Err(_elapsed) => break,
                },
                (None, Some(idle)) => match timeout(idle, self.socket.recv_from()).await {
                    Ok(r) => r,
                    Err(_elapsed) => return Err(ConnError::IdleTimeout),
                },
                (None, None) => self.socket.recv_from().await,
            };

            let (packet, addr) = match result {
                Ok(v) => v,
                Err(SocketError::Packet(e)) => {
                    log::warn!("[udp] discarding datagram: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            match self.peer {
                Some(peer) if peer != addr => {
                    log::debug!("[udp] ignoring datagram from stranger {addr}");
                    continue;
                }
                Some(_) => {}
                None => {
                    log::info!("[udp] receiving from {addr}");
                    self.peer = Some(addr);
                }
            }

            if done {
                // Past `count`: hand nothing more up, only repair the final ACK.
                let ack = *self.receiver.last_ack();
                log::debug!("[udp] lingering; re-sending ACK {} for seq {}", ack.acknum, packet.seqnum);
                self.socket.send_to(&ack, addr).await?;
                continue;
            }

            self.receiver.on_packet(&packet, &mut self.outbox);
            for (_, action) in self.outbox.drain() {
                match action {
                    Action::Transmit(ack) => self.socket.send_to(&ack, addr).await?,
                    Action::Deliver(message) => {
                        delivered += 1;
                        on_message(&message);
                    }
                    Action::StartTimer(_) | Action::StopTimer => {
                        log::debug!("[udp] receiver timer request ignored ({})", Role::B);
                    }
                }
            }
        }

        Ok(delivered)
    }
}
