//! Fixed-capacity storage for in-flight packets.
//!
//! [`WindowBuffer`] holds an owned copy of every packet the sender has
//! transmitted but not yet seen acknowledged.  Slot `seq mod capacity` holds
//! the packet with sequence number `seq`; because at most `capacity`
//! consecutive sequence numbers are outstanding, no two live packets ever
//! share a slot.

use crate::packet::Packet;

/// A single in-flight packet occupying one slot of the window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowEntry {
    /// The stamped packet, retransmitted verbatim on timeout.
    pub packet: Packet,
    /// Total number of times this packet has been transmitted.
    pub tx_count: u32,
    /// Clock reading at the first transmission.
    pub sent_at: f64,
}

/// Ring of `capacity` slots indexed by sequence number.
#[derive(Debug)]
pub struct WindowBuffer {
    slots: Box<[Option<WindowEntry>]>,
}

impl WindowBuffer {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "window capacity must be at least 1");
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store a freshly transmitted packet in the slot for its sequence number.
    ///
    /// Any previous occupant of the slot is overwritten; the caller
    /// guarantees it was already released.
    pub fn store(&mut self, packet: Packet, sent_at: f64) {
        let index = self.index(packet.seqnum);
        debug_assert!(
            self.slots[index].is_none(),
            "slot {index} still holds seq {:?}",
            self.slots[index].as_ref().map(|e| e.packet.seqnum)
        );
        self.slots[index] = Some(WindowEntry {
            packet,
            tx_count: 1,
            sent_at,
        });
    }

    /// The entry for `seq`, if that exact sequence number is stored.
    pub fn get(&self, seq: i32) -> Option<&WindowEntry> {
        self.slots[self.index(seq)]
            .as_ref()
            .filter(|e| e.packet.seqnum == seq)
    }

    /// Mutable access to the entry for `seq`.
    pub fn get_mut(&mut self, seq: i32) -> Option<&mut WindowEntry> {
        let index = self.index(seq);
        self.slots[index]
            .as_mut()
            .filter(|e| e.packet.seqnum == seq)
    }

    /// Free the slot holding `seq`, returning its entry.
    pub fn release(&mut self, seq: i32) -> Option<WindowEntry> {
        if self.get(seq).is_none() {
            return None;
        }
        let index = self.index(seq);
        self.slots[index].take()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    fn index(&self, seq: i32) -> usize {
        seq.rem_euclid(self.slots.len() as i32) as usize
    }
}
