//! Packet and message data model plus the fixed-size wire codec.
//!
//! Every unit exchanged between the two peers is a [`Packet`]; every unit
//! exchanged with the application is a [`Message`].  Both carry exactly
//! [`PAYLOAD_LEN`] bytes of opaque data.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! All integers are **big-endian** two's-complement.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Acknowledgment Number                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Checksum                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Payload (20 bytes) ...                   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total size: [`WIRE_LEN`] = 32 bytes.
//!
//! [`Packet::decode`] only checks the length.  Checksum validity is a
//! protocol decision made by the state machines: the receiver must still see
//! a corrupted packet so it can re-send its last acknowledgement.

use std::fmt;

use crate::checksum;

/// Bytes of application data carried by every packet and message.
pub const PAYLOAD_LEN: usize = 20;

/// Byte length of an encoded packet.
pub const WIRE_LEN: usize = 32;

// Byte offsets of each field within the encoded packet.
const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 4;
const OFF_CHECKSUM: usize = 8;
const OFF_PAYLOAD: usize = 12;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Application-layer unit: a fixed block of opaque bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Message {
    pub data: [u8; PAYLOAD_LEN],
}

impl Message {
    pub fn new(data: [u8; PAYLOAD_LEN]) -> Self {
        Self { data }
    }

    /// Build a message from an arbitrary slice, truncating or zero-padding
    /// to [`PAYLOAD_LEN`].
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut data = [0u8; PAYLOAD_LEN];
        let n = bytes.len().min(PAYLOAD_LEN);
        data[..n].copy_from_slice(&bytes[..n]);
        Self { data }
    }

    /// A message whose every byte is `byte`.
    pub fn filled(byte: u8) -> Self {
        Self {
            data: [byte; PAYLOAD_LEN],
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self
            .data
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |i| i + 1);
        write!(f, "{}", String::from_utf8_lossy(&self.data[..end]))
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// Wire unit exchanged between the sender and the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number of a data packet (data packets number from 1).
    pub seqnum: i32,
    /// Cumulative acknowledgement number; meaningful on ACK packets only.
    pub acknum: i32,
    /// Additive checksum over `seqnum`, `acknum` and `payload`.
    pub checksum: i32,
    pub payload: [u8; PAYLOAD_LEN],
}

impl Packet {
    /// Build a stamped data packet carrying `message`.
    pub fn data(seqnum: i32, message: &Message) -> Self {
        Self::stamped(seqnum, 0, message.data)
    }

    /// Build a stamped acknowledgement for `acknum` with an empty payload.
    pub fn ack(acknum: i32) -> Self {
        Self::stamped(0, acknum, [0u8; PAYLOAD_LEN])
    }

    fn stamped(seqnum: i32, acknum: i32, payload: [u8; PAYLOAD_LEN]) -> Self {
        Self {
            seqnum,
            acknum,
            checksum: checksum::compute(seqnum, acknum, &payload),
            payload,
        }
    }

    /// Checksum the covered fields as they currently are.
    pub fn expected_checksum(&self) -> i32 {
        checksum::compute(self.seqnum, self.acknum, &self.payload)
    }

    /// `true` when the stored checksum disagrees with the packet contents.
    pub fn is_corrupt(&self) -> bool {
        self.checksum != self.expected_checksum()
    }

    /// The payload viewed as an application message.
    pub fn message(&self) -> Message {
        Message::new(self.payload)
    }

    /// Serialise into the fixed [`WIRE_LEN`]-byte record.
    ///
    /// The stored checksum is written as-is; it is not recomputed.
    pub fn encode(&self) -> [u8; WIRE_LEN] {
        let mut buf = [0u8; WIRE_LEN];
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&self.seqnum.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&self.acknum.to_be_bytes());
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 4].copy_from_slice(&self.checksum.to_be_bytes());
        buf[OFF_PAYLOAD..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Packet`] from a raw datagram.
    ///
    /// Returns [`PacketError::WrongLength`] unless `buf` is exactly
    /// [`WIRE_LEN`] bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() != WIRE_LEN {
            return Err(PacketError::WrongLength(buf.len()));
        }

        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&buf[OFF_PAYLOAD..]);

        Ok(Packet {
            seqnum: read_i32(buf, OFF_SEQ),
            acknum: read_i32(buf, OFF_ACK),
            checksum: read_i32(buf, OFF_CHECKSUM),
            payload,
        })
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seq={} ack={} csum={} payload=\"{}\"",
            self.seqnum,
            self.acknum,
            self.checksum,
            self.message()
        )
    }
}

fn read_i32(buf: &[u8], off: usize) -> i32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[off..off + 4]);
    i32::from_be_bytes(word)
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, PartialEq, Eq)]
pub enum PacketError {
    /// Datagram is not exactly [`WIRE_LEN`] bytes long.
    WrongLength(usize),
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketError::WrongLength(n) => {
                write!(f, "datagram is {n} bytes, expected {WIRE_LEN}")
            }
        }
    }
}

impl std::error::Error for PacketError {}
