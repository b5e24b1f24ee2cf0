//! Go-Back-N receive-side state machine (peer "B").
//!
//! [`Receiver`] implements the receiver side of Go-Back-N:
//!
//! - Only an intact packet with `seqnum == expected_seq` is accepted; its
//!   payload is delivered to the application exactly once and acknowledged.
//! - Anything else (corrupted, duplicate, or out-of-order) is discarded and
//!   answered with the **last ACK sent**, unchanged.  Out-of-order data is
//!   never buffered.
//!
//! All effects go through the [`Network`] handed to each call.

use crate::network::{Network, Role};
use crate::packet::Packet;

/// Counters describing what a receiver has done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Messages handed to the application.
    pub delivered: u64,
    /// Packets that failed the checksum.
    pub corrupt: u64,
    /// Intact packets whose sequence number was not the expected one.
    pub out_of_order: u64,
    /// Times the previous ACK was sent again.
    pub reacks: u64,
}

/// Go-Back-N receive-side state for one session.
#[derive(Debug)]
pub struct Receiver {
    /// Next in-order sequence number expected from the sender.
    expected_seq: i32,

    /// The most recently sent acknowledgement, re-sent verbatim on any
    /// non-matching input.  Starts as a stamped ACK for 0.
    last_ack: Packet,

    stats: ReceiverStats,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver {
    pub fn new() -> Self {
        Self {
            expected_seq: 1,
            last_ack: Packet::ack(0),
            stats: ReceiverStats::default(),
        }
    }

    pub fn expected_seq(&self) -> i32 {
        self.expected_seq
    }

    pub fn last_ack(&self) -> &Packet {
        &self.last_ack
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    /// Process a packet arriving from the sender.
    pub fn on_packet<N: Network>(&mut self, packet: &Packet, net: &mut N) {
        let corrupt = packet.is_corrupt();

        if !corrupt && packet.seqnum == self.expected_seq {
            net.deliver(Role::B, packet.message());
            self.last_ack = Packet::ack(self.expected_seq);
            log::debug!(
                "[gbn:B] ← DATA seq={} delivered; → ACK {}",
                packet.seqnum,
                self.expected_seq
            );
            net.udt_send(Role::B, self.last_ack);
            self.expected_seq += 1;
            self.stats.delivered += 1;
            return;
        }

        if corrupt {
            self.stats.corrupt += 1;
            log::debug!("[gbn:B] ← corrupt packet; re-sending ACK {}", self.last_ack.acknum);
        } else {
            self.stats.out_of_order += 1;
            log::debug!(
                "[gbn:B] ← DATA seq={} (expected {}); re-sending ACK {}",
                packet.seqnum,
                self.expected_seq,
                self.last_ack.acknum
            );
        }
        self.stats.reacks += 1;
        net.udt_send(Role::B, self.last_ack);
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Action, Outbox};
    use crate::packet::Message;

    fn data(seq: i32) -> Packet {
        Packet::data(seq, &Message::filled(b'a' + seq as u8))
    }

    #[test]
    fn initial_state() {
        let r = Receiver::new();
        assert_eq!(r.expected_seq(), 1);
        assert_eq!(r.last_ack(), &Packet::ack(0));
        assert!(!r.last_ack().is_corrupt());
    }

    #[test]
    fn in_order_packet_delivered_and_acked() {
        let mut r = Receiver::new();
        let mut out = Outbox::new();
        r.on_packet(&data(1), &mut out);

        assert_eq!(r.expected_seq(), 2);
        assert_eq!(
            out.actions(),
            &[
                (Role::B, Action::Deliver(data(1).message())),
                (Role::B, Action::Transmit(Packet::ack(1))),
            ]
        );
    }

    #[test]
    fn out_of_order_packet_reacks_last() {
        let mut r = Receiver::new();
        let mut out = Outbox::new();
        r.on_packet(&data(1), &mut out);
        out.drain();

        r.on_packet(&data(3), &mut out); // seq 2 missing
        assert_eq!(r.expected_seq(), 2);
        assert_eq!(out.actions(), &[(Role::B, Action::Transmit(Packet::ack(1)))]);
        assert_eq!(r.stats().out_of_order, 1);
    }

    #[test]
    fn duplicate_is_not_redelivered() {
        let mut r = Receiver::new();
        let mut out = Outbox::new();
        r.on_packet(&data(1), &mut out);
        r.on_packet(&data(1), &mut out);

        assert_eq!(out.delivered().len(), 1);
        assert_eq!(out.transmitted(), vec![Packet::ack(1), Packet::ack(1)]);
    }

    #[test]
    fn corrupt_expected_packet_reacks_without_delivery() {
        let mut r = Receiver::new();
        let mut out = Outbox::new();
        let mut pkt = data(1);
        pkt.checksum ^= 0x10;

        r.on_packet(&pkt, &mut out);
        assert_eq!(r.expected_seq(), 1);
        assert_eq!(out.actions(), &[(Role::B, Action::Transmit(Packet::ack(0)))]);
        assert_eq!(r.stats().corrupt, 1);
    }

    #[test]
    fn sequential_packets_advance_expected_seq() {
        let mut r = Receiver::new();
        let mut out = Outbox::new();
        for seq in 1..=5 {
            r.on_packet(&data(seq), &mut out);
        }
        assert_eq!(r.expected_seq(), 6);
        assert_eq!(r.last_ack(), &Packet::ack(5));
        assert_eq!(r.stats().delivered, 5);
        assert_eq!(out.delivered().len(), 5);
    }
}
