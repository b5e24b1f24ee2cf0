//! Go-Back-N send-side state machine (peer "A").
//!
//! [`Sender`] maintains a sliding window of up to `N` in-flight packets.
//!
//! # Protocol contract
//!
//! - At most `window_size` packets may be in flight at once; a `send` that
//!   would exceed it is refused (backpressure, not an error).
//! - ACKs are **cumulative**: `acknum = K` means the receiver has accepted
//!   every packet up to and including sequence number `K`.
//! - One aggregate timer covers the whole window.  On timeout **all**
//!   unacknowledged packets from `base` onwards are retransmitted (go back N).
//! - Corrupted and stale ACKs never change any state.
//!
//! All effects (transmission, timers, clock) go through the
//! [`Network`] handed to each call.

use crate::config::{ConfigError, ProtocolConfig};
use crate::network::{Network, Role};
use crate::packet::{Message, Packet};
use crate::rtt::{RttEstimator, RttSampling};
use crate::state::SenderState;
use crate::window::WindowBuffer;

// ---------------------------------------------------------------------------
// SenderStats
// ---------------------------------------------------------------------------

/// Counters describing what a sender has done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Messages accepted by [`Sender::send`].
    pub accepted: u64,
    /// `send` calls refused because the window was full.
    pub rejected: u64,
    /// Packets put on the wire, first transmissions and retransmissions.
    pub transmissions: u64,
    /// Packets put on the wire again by a timeout.
    pub retransmissions: u64,
    /// Timer expiries handled.
    pub timeouts: u64,
    /// ACKs that failed the checksum.
    pub corrupt_acks: u64,
    /// Valid ACKs below `base` (duplicates) or beyond `next_seq - 1`.
    pub ignored_acks: u64,
    /// RTT samples fed to the estimator.
    pub rtt_samples: u64,
    /// RTT samples withheld by [`RttSampling::SkipRetransmitted`].
    pub rtt_samples_skipped: u64,
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Go-Back-N send-side state for one session.
///
/// # Sequence-number layout
///
/// ```text
///     base             next_seq
///      │                  │
///  ────┼──────────────────┼──────────────────▶ seq space
///      │ <── in flight ──▶│ <── sendable ───▶ (until base + N)
/// ```
#[derive(Debug)]
pub struct Sender {
    /// Sequence number of the **oldest** unacked packet (left window edge).
    base: i32,

    /// Sequence number to use for the **next** new packet.
    next_seq: i32,

    /// Owned copies of every in-flight packet.
    window: WindowBuffer,

    rtt: RttEstimator,
    sampling: RttSampling,
    state: SenderState,

    /// Clock reading at the most recent advancing ACK.
    end_time: Option<f64>,

    stats: SenderStats,
}

impl Default for Sender {
    fn default() -> Self {
        Self::new()
    }
}

impl Sender {
    /// Create a sender with the default [`ProtocolConfig`].
    pub fn new() -> Self {
        Self::build(&ProtocolConfig::default())
    }

    /// Create a sender after validating `config`.
    pub fn with_config(config: &ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: &ProtocolConfig) -> Self {
        Self {
            base: 1,
            next_seq: 1,
            window: WindowBuffer::new(config.window_size),
            rtt: RttEstimator::new(config.initial_rtt, config.alpha),
            sampling: config.rtt_sampling,
            state: SenderState::Idle,
            end_time: None,
            stats: SenderStats::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn base(&self) -> i32 {
        self.base
    }

    pub fn next_seq(&self) -> i32 {
        self.next_seq
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn window_size(&self) -> usize {
        self.window.capacity()
    }

    /// Number of packets currently awaiting acknowledgement.
    pub fn in_flight(&self) -> usize {
        (self.next_seq - self.base) as usize
    }

    /// `true` when there is room for at least one more in-flight packet.
    pub fn can_send(&self) -> bool {
        self.in_flight() < self.window.capacity()
    }

    /// Current smoothed RTT, also the retransmission timeout.
    pub fn estimated_rtt(&self) -> f64 {
        self.rtt.estimated()
    }

    /// Clock reading at the most recent advancing ACK, if any.
    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    /// The stored copy of in-flight packet `seq`.
    pub fn outstanding(&self, seq: i32) -> Option<&Packet> {
        if seq < self.base || seq >= self.next_seq {
            return None;
        }
        self.window.get(seq).map(|e| &e.packet)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Offer one application message for transmission.
    ///
    /// Returns `false`, with no protocol state touched, when the window is
    /// full; the caller should retry after an ACK has slid the window.
    pub fn send<N: Network>(&mut self, message: &Message, net: &mut N) -> bool {
        if !self.can_send() {
            self.stats.rejected += 1;
            log::debug!(
                "[gbn:A] window full (base={} next_seq={}); refusing message",
                self.base,
                self.next_seq
            );
            return false;
        }

        let packet = Packet::data(self.next_seq, message);
        let now = net.clock();
        self.window.store(packet, now);

        if self.state.is_idle() {
            self.state = SenderState::Outstanding { start_time: now };
            net.start_timer(Role::A, self.rtt.timeout());
        }

        log::debug!("[gbn:A] → DATA {packet}");
        net.udt_send(Role::A, packet);
        self.next_seq += 1;
        self.stats.accepted += 1;
        self.stats.transmissions += 1;
        self.check_invariants();
        true
    }

    /// Process a packet arriving from the receiver.
    pub fn on_packet<N: Network>(&mut self, packet: &Packet, net: &mut N) {
        if packet.is_corrupt() {
            self.stats.corrupt_acks += 1;
            log::debug!("[gbn:A] ← corrupt ACK discarded ({packet})");
            return;
        }

        let ack = packet.acknum;
        if ack < self.base || ack >= self.next_seq {
            self.stats.ignored_acks += 1;
            log::debug!(
                "[gbn:A] ← ACK {} ignored (base={} next_seq={})",
                ack,
                self.base,
                self.next_seq
            );
            return;
        }

        let now = net.clock();
        self.end_time = Some(now);
        self.sample_rtt(now);

        for seq in self.base..=ack {
            self.window.release(seq);
        }
        self.base = ack + 1;

        if self.base >= self.next_seq {
            self.state = SenderState::Idle;
            net.stop_timer(Role::A);
            log::debug!("[gbn:A] ← ACK {ack}; window drained, timer stopped");
        } else {
            let start_time = self.window.get(self.base).map_or(now, |e| e.sent_at);
            self.state = SenderState::Outstanding { start_time };
            net.start_timer(Role::A, self.rtt.timeout());
            log::debug!(
                "[gbn:A] ← ACK {ack}; base={} in_flight={}, timer restarted ({:.3})",
                self.base,
                self.in_flight(),
                self.rtt.timeout()
            );
        }
        self.check_invariants();
    }

    /// Handle expiry of the retransmission timer.
    ///
    /// Restarts the timer and retransmits every packet in
    /// `[base, next_seq)` in ascending order.
    pub fn on_timeout<N: Network>(&mut self, net: &mut N) {
        if self.state.is_idle() {
            log::warn!("[gbn:A] timeout while idle ignored");
            return;
        }
        self.stats.timeouts += 1;

        net.start_timer(Role::A, self.rtt.timeout());
        log::debug!(
            "[gbn:A] timeout, retransmitting {} packet(s) from seq {}",
            self.in_flight(),
            self.base
        );

        for seq in self.base..self.next_seq {
            match self.window.get_mut(seq) {
                Some(entry) => {
                    entry.tx_count += 1;
                    net.udt_send(Role::A, entry.packet);
                    self.stats.transmissions += 1;
                    self.stats.retransmissions += 1;
                }
                None => log::warn!("[gbn:A] seq {seq} missing from window"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Fold `now - start_time` into the RTT estimate if the policy allows.
    fn sample_rtt(&mut self, now: f64) {
        let SenderState::Outstanding { start_time } = self.state else {
            return;
        };
        let tx_count = self.window.get(self.base).map_or(1, |e| e.tx_count);

        if !self.sampling.accepts(tx_count) {
            self.stats.rtt_samples_skipped += 1;
            log::debug!(
                "[gbn:A] RTT sample skipped: seq {} was sent {tx_count} times",
                self.base
            );
            return;
        }
        if tx_count > 1 {
            log::debug!(
                "[gbn:A] ambiguous RTT sample: seq {} was sent {tx_count} times",
                self.base
            );
        }
        self.rtt.update(now - start_time);
        self.stats.rtt_samples += 1;
    }

    fn check_invariants(&self) {
        debug_assert!(self.base <= self.next_seq);
        debug_assert!(self.in_flight() <= self.window.capacity());
        debug_assert_eq!(self.state.is_idle(), self.base == self.next_seq);
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Action, Outbox};

    fn msg(i: i32) -> Message {
        Message::filled(b'a' + (i % 26) as u8)
    }

    /// Helper: a sender that has sent `n` messages.
    fn sender_with(n: i32, out: &mut Outbox) -> Sender {
        let mut s = Sender::new();
        for i in 1..=n {
            assert!(s.send(&msg(i), out));
        }
        s
    }

    #[test]
    fn initial_state() {
        let s = Sender::new();
        assert_eq!(s.base(), 1);
        assert_eq!(s.next_seq(), 1);
        assert_eq!(s.state(), SenderState::Idle);
        assert_eq!(s.estimated_rtt(), 250.0);
        assert!(s.can_send());
        assert_eq!(s.in_flight(), 0);
    }

    #[test]
    fn first_send_starts_timer_and_transmits() {
        let mut out = Outbox::new();
        out.set_clock(5.0);
        let s = sender_with(1, &mut out);

        assert_eq!(s.next_seq(), 2);
        assert_eq!(s.state(), SenderState::Outstanding { start_time: 5.0 });
        assert_eq!(
            out.actions(),
            &[
                (Role::A, Action::StartTimer(250.0)),
                (Role::A, Action::Transmit(Packet::data(1, &msg(1)))),
            ]
        );
    }

    #[test]
    fn later_sends_do_not_restart_timer() {
        let mut out = Outbox::new();
        let _ = sender_with(3, &mut out);
        let starts = out
            .actions()
            .iter()
            .filter(|(_, a)| matches!(a, Action::StartTimer(_)))
            .count();
        assert_eq!(starts, 1);
        assert_eq!(out.transmitted().len(), 3);
    }

    #[test]
    fn full_window_rejects_without_side_effects() {
        let mut out = Outbox::new();
        let mut s = sender_with(10, &mut out);
        let before = out.actions().len();

        assert!(!s.send(&msg(11), &mut out));
        assert_eq!(out.actions().len(), before);
        assert_eq!(s.next_seq(), 11);
        assert_eq!(s.base(), 1);
        assert_eq!(s.stats().rejected, 1);
    }

    #[test]
    fn stored_copy_matches_transmission() {
        let mut out = Outbox::new();
        let s = sender_with(2, &mut out);
        assert_eq!(s.outstanding(2), Some(&Packet::data(2, &msg(2))));
        assert_eq!(s.outstanding(3), None);
    }

    #[test]
    fn cumulative_ack_slides_window() {
        let mut out = Outbox::new();
        let mut s = sender_with(4, &mut out);
        out.drain();

        s.on_packet(&Packet::ack(3), &mut out);
        assert_eq!(s.base(), 4);
        assert_eq!(s.in_flight(), 1);
        assert_eq!(out.actions(), &[(Role::A, Action::StartTimer(s.estimated_rtt()))]);
        assert!(s.outstanding(3).is_none());
    }

    #[test]
    fn final_ack_stops_timer() {
        let mut out = Outbox::new();
        let mut s = sender_with(2, &mut out);
        out.drain();

        s.on_packet(&Packet::ack(2), &mut out);
        assert_eq!(s.base(), 3);
        assert_eq!(s.state(), SenderState::Idle);
        assert_eq!(out.actions(), &[(Role::A, Action::StopTimer)]);
    }

    #[test]
    fn ack_samples_rtt() {
        let mut out = Outbox::new();
        let mut s = sender_with(1, &mut out);
        out.set_clock(10.0);
        s.on_packet(&Packet::ack(1), &mut out);

        // 0.875 * 250 + 0.125 * 10
        assert!((s.estimated_rtt() - 220.0).abs() < 1e-9);
        assert_eq!(s.end_time(), Some(10.0));
        assert_eq!(s.stats().rtt_samples, 1);
    }

    #[test]
    fn partial_ack_times_next_oldest_packet() {
        let mut out = Outbox::new();
        let mut s = sender_with(1, &mut out);
        out.set_clock(4.0);
        assert!(s.send(&msg(2), &mut out));
        out.set_clock(10.0);
        s.on_packet(&Packet::ack(1), &mut out);

        assert_eq!(s.state(), SenderState::Outstanding { start_time: 4.0 });
    }

    #[test]
    fn stale_ack_is_ignored() {
        let mut out = Outbox::new();
        let mut s = sender_with(3, &mut out);
        s.on_packet(&Packet::ack(1), &mut out);
        out.drain();
        let rtt = s.estimated_rtt();

        s.on_packet(&Packet::ack(1), &mut out);
        s.on_packet(&Packet::ack(0), &mut out);
        assert_eq!(s.base(), 2);
        assert_eq!(s.estimated_rtt(), rtt);
        assert!(out.actions().is_empty());
        assert_eq!(s.stats().ignored_acks, 2);
    }

    #[test]
    fn ack_beyond_next_seq_is_ignored() {
        let mut out = Outbox::new();
        let mut s = sender_with(2, &mut out);
        out.drain();

        s.on_packet(&Packet::ack(7), &mut out);
        assert_eq!(s.base(), 1);
        assert!(out.actions().is_empty());
    }

    #[test]
    fn corrupt_ack_is_inert() {
        let mut out = Outbox::new();
        let mut s = sender_with(3, &mut out);
        out.drain();

        let mut ack = Packet::ack(3);
        ack.payload[0] = 1;
        s.on_packet(&ack, &mut out);

        assert_eq!(s.base(), 1);
        assert_eq!(s.estimated_rtt(), 250.0);
        assert!(out.actions().is_empty());
        assert_eq!(s.stats().corrupt_acks, 1);
    }

    #[test]
    fn timeout_retransmits_whole_window_in_order() {
        let mut out = Outbox::new();
        let mut s = sender_with(5, &mut out);
        s.on_packet(&Packet::ack(2), &mut out);
        out.drain();

        s.on_timeout(&mut out);
        let seqs: Vec<i32> = out.transmitted().iter().map(|p| p.seqnum).collect();
        assert_eq!(seqs, vec![3, 4, 5]);
        assert_eq!(out.actions()[0], (Role::A, Action::StartTimer(s.estimated_rtt())));
        assert_eq!(s.base(), 3);
        assert_eq!(s.next_seq(), 6);
        assert_eq!(s.stats().retransmissions, 3);
    }

    #[test]
    fn timeout_while_idle_does_nothing() {
        let mut out = Outbox::new();
        let mut s = Sender::new();
        s.on_timeout(&mut out);
        assert!(out.actions().is_empty());
        assert_eq!(s.stats().timeouts, 0);
    }

    #[test]
    fn karn_policy_skips_retransmitted_sample() {
        let config = ProtocolConfig::default().with_rtt_sampling(RttSampling::SkipRetransmitted);
        let mut s = Sender::with_config(&config).unwrap();
        let mut out = Outbox::new();
        assert!(s.send(&msg(1), &mut out));
        s.on_timeout(&mut out);
        out.set_clock(400.0);
        s.on_packet(&Packet::ack(1), &mut out);

        assert_eq!(s.base(), 2);
        assert_eq!(s.estimated_rtt(), 250.0);
        assert_eq!(s.stats().rtt_samples_skipped, 1);
    }

    #[test]
    fn every_ack_policy_samples_retransmitted_packet() {
        let mut out = Outbox::new();
        let mut s = sender_with(1, &mut out);
        s.on_timeout(&mut out);
        out.set_clock(400.0);
        s.on_packet(&Packet::ack(1), &mut out);

        // 0.875 * 250 + 0.125 * 400
        assert!((s.estimated_rtt() - 268.75).abs() < 1e-9);
    }

    #[test]
    fn small_window_from_config() {
        let config = ProtocolConfig::default().with_window_size(2);
        let mut s = Sender::with_config(&config).unwrap();
        let mut out = Outbox::new();
        assert!(s.send(&msg(1), &mut out));
        assert!(s.send(&msg(2), &mut out));
        assert!(!s.send(&msg(3), &mut out));
        s.on_packet(&Packet::ack(1), &mut out);
        assert!(s.send(&msg(3), &mut out));
        assert_eq!(s.outstanding(3), Some(&Packet::data(3, &msg(3))));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ProtocolConfig::default().with_window_size(0);
        assert!(Sender::with_config(&config).is_err());
    }
}
