//! Additive packet checksum.
//!
//! The checksum is the 32-bit wrapping sum of the sequence number, the
//! acknowledgement number and every payload byte (taken as unsigned).  It is
//! a detection-only code: a mismatch means "corrupted, discard"; a match does
//! not prove the packet is intact.
//!
//! Payload bytes are widened as `u8`, never sign-extended, so for bytes of
//! `0x80` and above the result differs from a signed-byte sum.
//!
//! Both peers use the same function to stamp outgoing packets and to validate
//! incoming ones (see [`crate::packet::Packet::is_corrupt`]).

use crate::packet::PAYLOAD_LEN;

/// Compute the checksum over the three covered fields of a packet.
pub fn compute(seqnum: i32, acknum: i32, payload: &[u8; PAYLOAD_LEN]) -> i32 {
    payload
        .iter()
        .fold(seqnum.wrapping_add(acknum), |sum, &b| {
            sum.wrapping_add(i32::from(b))
        })
}
