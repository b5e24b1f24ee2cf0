//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`Packet`] instead of raw bytes.  It can optionally run every outgoing
//! packet through a [`FaultModel`] so a real loopback transfer can be made
//! as lossy as the simulator.  All protocol logic lives elsewhere; this
//! module owns only byte I/O.

use std::net::SocketAddr;
use std::sync::Mutex;

use tokio::net::UdpSocket;

use crate::fault::{Fate, FaultModel};
use crate::packet::{Packet, PacketError, WIRE_LEN};

/// Receive buffer size; anything longer than a packet is rejected by decode.
const MAX_DATAGRAM: usize = 2 * WIRE_LEN;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from socket operations.
#[derive(Debug)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    Io(std::io::Error),
    /// The received datagram is not a packet.
    Packet(PacketError),
}

impl std::fmt::Display for SocketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "socket I/O error: {e}"),
            Self::Packet(e) => write!(f, "packet decode error: {e}"),
        }
    }
}

impl std::error::Error for SocketError {}

impl From<std::io::Error> for SocketError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<PacketError> for SocketError {
    fn from(e: PacketError) -> Self {
        Self::Packet(e)
    }
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async, packet-oriented UDP socket.
///
/// All methods are `&self` so the socket can be shared across tasks if needed.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
    faults: Option<Mutex<FaultModel>>,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `127.0.0.1:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self {
            local_addr,
            inner,
            faults: None,
        })
    }

    /// Apply `faults` to every packet this socket sends.
    pub fn with_faults(mut self, faults: FaultModel) -> Self {
        self.faults = Some(Mutex::new(faults));
        self
    }

    /// Encode `packet` and send it as a single UDP datagram to `dest`.
    ///
    /// With a fault model attached the packet may be silently dropped or
    /// sent damaged; either way the call succeeds.
    pub async fn send_to(&self, packet: &Packet, dest: SocketAddr) -> Result<(), SocketError> {
        let packet = match self.fate(*packet) {
            Fate::Lost => {
                log::debug!("[udp] dropped on send: {packet}");
                return Ok(());
            }
            Fate::Corrupted(damaged) => {
                log::debug!("[udp] corrupted on send: {damaged}");
                damaged
            }
            Fate::Delivered(p) => p,
        };
        self.inner.send_to(&packet.encode(), dest).await?;
        Ok(())
    }

    /// Receive the next datagram and decode it into a [`Packet`].
    ///
    /// Returns `(packet, sender_address)`.  Datagrams of the wrong size are
    /// returned as `Err`; the caller decides whether to retry.
    pub async fn recv_from(&self) -> Result<(Packet, SocketAddr), SocketError> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        let packet = Packet::decode(&buf[..n])?;
        Ok((packet, addr))
    }

    fn fate(&self, packet: Packet) -> Fate {
        match &self.faults {
            Some(model) => match model.lock() {
                Ok(mut model) => model.apply(packet),
                Err(poisoned) => poisoned.into_inner().apply(packet),
            },
            None => Fate::Delivered(packet),
        }
    }
}
