//! Receive slot rotation and reply staging.
//!
//! The OUT endpoint owns three interchangeable 64-byte slots so the bus
//! can accept up to three back-to-back host packets while an older one
//! is still being processed. Slots are filled and drained in strict ring
//! order, which keeps packet processing in host-send order. The IN side
//! is a single staging buffer with an explicit busy flag: at most one
//! reply is in flight at a time.

use crate::proto::{Reply, PACKET_SIZE};

/// Number of receive slots.
pub const NUM_SLOTS: usize = 3;

struct Slot {
    buf: [u8; PACKET_SIZE],
    len: usize,
    /// Host data deposited, not yet consumed.
    pending: bool,
}

impl Slot {
    const fn new() -> Self {
        Self {
            buf: [0; PACKET_SIZE],
            len: 0,
            pending: false,
        }
    }
}

/// Arena of three receive slots plus the rotation cursor.
///
/// Deposits go to the first free slot in ring order from the cursor and
/// drains happen at the cursor, so pending slots always form a contiguous
/// run starting there. When all three slots are pending no slot is
/// offered for a deposit and the packet simply stays with the bus.
pub struct SlotRing {
    slots: [Slot; NUM_SLOTS],
    cursor: usize,
}

impl SlotRing {
    /// All slots armed for reception, cursor at slot 0.
    pub const fn new() -> Self {
        Self {
            slots: [Slot::new(), Slot::new(), Slot::new()],
            cursor: 0,
        }
    }

    /// Back to the initial state; any undrained packets are discarded.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Offer the next armed slot to `fill` (typically an endpoint read).
    ///
    /// Returns `Ok(true)` if a packet was deposited, `Ok(false)` if every
    /// slot is still pending, and the `fill` error unchanged otherwise
    /// (the slot stays armed in that case).
    pub fn receive<E>(
        &mut self,
        fill: impl FnOnce(&mut [u8]) -> Result<usize, E>,
    ) -> Result<bool, E> {
        let Some(idx) = self.free_slot() else {
            return Ok(false);
        };
        let slot = &mut self.slots[idx];
        let len = fill(&mut slot.buf)?;
        slot.len = len;
        slot.pending = true;
        Ok(true)
    }

    /// The packet at the cursor, if the host has deposited one.
    pub fn peek(&self) -> Option<&[u8]> {
        let slot = &self.slots[self.cursor];
        if !slot.pending {
            return None;
        }
        Some(&slot.buf[..slot.len])
    }

    /// Re-arm the slot at the cursor and advance the rotation.
    ///
    /// Must only be called after [`peek`](SlotRing::peek) returned a
    /// packet and its contents were consumed.
    pub fn release(&mut self) {
        self.slots[self.cursor].pending = false;
        self.slots[self.cursor].len = 0;
        self.cursor = (self.cursor + 1) % NUM_SLOTS;
    }

    /// Number of deposited packets awaiting processing.
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| s.pending).count()
    }

    fn free_slot(&self) -> Option<usize> {
        for i in 0..NUM_SLOTS {
            let idx = (self.cursor + i) % NUM_SLOTS;
            if !self.slots[idx].pending {
                return Some(idx);
            }
        }
        None
    }
}

impl Default for SlotRing {
    fn default() -> Self {
        Self::new()
    }
}

/// Single IN staging buffer with the "handle busy" flag.
pub struct ReplySlot {
    buf: [u8; PACKET_SIZE],
    busy: bool,
}

impl ReplySlot {
    /// Empty, not busy.
    pub const fn new() -> Self {
        Self {
            buf: [0; PACKET_SIZE],
            busy: false,
        }
    }

    /// Forget any in-flight reply.
    pub fn reset(&mut self) {
        self.busy = false;
    }

    /// A previously armed transmission has not completed yet.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Encode `reply` into the staging buffer, unless a transmission is
    /// still in flight. The caller arms the endpoint with the returned
    /// frame and then calls [`sent`](ReplySlot::sent); a `None` means the
    /// reply is dropped (best effort, the host re-issues the command).
    pub fn stage(&mut self, reply: Reply) -> Option<&[u8; PACKET_SIZE]> {
        if self.busy {
            return None;
        }
        reply.encode(&mut self.buf);
        Some(&self.buf)
    }

    /// The staged frame was handed to the transport.
    pub fn sent(&mut self) {
        self.busy = true;
    }

    /// The transport finished transmitting the frame.
    pub fn completed(&mut self) {
        self.busy = false;
    }
}

impl Default for ReplySlot {
    fn default() -> Self {
        Self::new()
    }
}
