//! Forward error correction state.
//!
//! Transmit side: a round-robin ring of the last [`FEC_PACKETS`] UMP-data
//! command packets. Every outbound datagram carries the whole ring, oldest
//! packet first, so a receiver can recover up to four consecutive lost
//! datagrams. Receive side: a sliding window of the last accepted packet
//! numbers, used to drop the redundant copies.

use bytes::{BufMut, BytesMut};

use crate::protocol::MAX_PACKET_WORDS;

/// Number of packets kept for redundancy, on both sides.
pub const FEC_PACKETS: usize = 5;

#[derive(Clone, Copy)]
struct FecSlot {
    filled: bool,
    len: usize,
    words: [u32; MAX_PACKET_WORDS],
}

impl FecSlot {
    const EMPTY: FecSlot = FecSlot {
        filled: false,
        len: 0,
        words: [0; MAX_PACKET_WORDS],
    };
}

/// Round-robin store of the last transmitted UMP-data command packets.
pub struct FecMemory {
    slots: [FecSlot; FEC_PACKETS],
    /// Slot the next packet will be written to; after [`record`](Self::record)
    /// it points at the oldest packet, which is where the tail walk starts.
    next_slot: usize,
}

impl FecMemory {
    pub fn new() -> Self {
        Self {
            slots: [FecSlot::EMPTY; FEC_PACKETS],
            next_slot: 0,
        }
    }

    pub fn reset(&mut self) {
        self.slots = [FecSlot::EMPTY; FEC_PACKETS];
        self.next_slot = 0;
    }

    /// Store a freshly assembled packet (header word plus up to 64 payload
    /// words), overwriting the oldest slot.
    pub fn record(&mut self, header: u32, payload: &[u32]) {
        debug_assert!(payload.len() < MAX_PACKET_WORDS);
        let slot = &mut self.slots[self.next_slot];
        slot.words[0] = header;
        slot.words[1..=payload.len()].copy_from_slice(payload);
        slot.len = payload.len() + 1;
        slot.filled = true;
        self.next_slot = (self.next_slot + 1) % FEC_PACKETS;
    }

    /// Append every stored packet to `buf` in chronological order (oldest
    /// first, the just-recorded packet last), words big-endian.
    pub fn append_tail(&self, buf: &mut BytesMut) {
        let mut index = self.next_slot;
        for _ in 0..FEC_PACKETS {
            let slot = &self.slots[index];
            if slot.filled {
                for &word in &slot.words[..slot.len] {
                    buf.put_u32(word);
                }
            }
            index = (index + 1) % FEC_PACKETS;
        }
    }
}

impl Default for FecMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// Sliding window of the last accepted UMP-data packet numbers.
pub struct ReplayWindow {
    seen: [u16; FEC_PACKETS],
}

impl ReplayWindow {
    pub fn new() -> Self {
        Self {
            seen: [0xFFFF; FEC_PACKETS],
        }
    }

    pub fn reset(&mut self) {
        self.seen = [0xFFFF; FEC_PACKETS];
    }

    /// Returns `true` and records `sequence` when it is new; returns `false`
    /// when `sequence` matches a recently accepted packet (an FEC replay).
    pub fn check_and_record(&mut self, sequence: u16) -> bool {
        if self.seen.contains(&sequence) {
            return false;
        }
        self.seen.copy_within(1.., 0);
        self.seen[FEC_PACKETS - 1] = sequence;
        true
    }
}

impl Default for ReplayWindow {
    fn default() -> Self {
        Self::new()
    }
}
