//! Command and streaming state machine.
//!
//! Every OUT packet drained by the buffer rotator is handed to
//! [`Transfer::handle_packet`]. While the transfer is [`Phase::Idle`]
//! the first byte of the packet selects a command; after a
//! "begin streaming" command every following packet is raw firmware
//! payload until the declared image size has been received.

use core::cmp::min;

/// Size of every bulk packet, both directions.
pub const PACKET_SIZE: usize = 64;

/// Reset the device.
const CMD_RESET: u8 = 0x01;
/// Prepare for a firmware update, then reset.
const CMD_SCHEDULE_PROGRAM: u8 = 0x02;
/// Status query.
const CMD_STATUS: u8 = 0x03;
/// Begin a streamed firmware transfer.
const CMD_BEGIN_STREAM: u8 = 0x04;

/// Offset of the little-endian total image size in a `CMD_BEGIN_STREAM` packet.
const SIZE_OFFSET: usize = 4;
/// Offset of the first payload byte in a `CMD_BEGIN_STREAM` packet.
const STREAM_HEADER: usize = 8;
/// Payload capacity of the initiating packet.
const FIRST_CHUNK: usize = PACKET_SIZE - STREAM_HEADER;

/// Status reply payload: device is ready, running the loader.
///
/// The host-side tool also knows `0x00` (not ready) and `0x02` (ready,
/// running the main application); this implementation always reports
/// from the loader.
const STATUS_READY_IN_LOADER: u8 = 0x01;

/// Firmware-side effects the protocol core delegates.
///
/// The core never touches flash or reset hardware itself; it invokes
/// these hooks at the documented protocol points and nothing else.
/// Implementations usually set a magic RAM flag and trigger a system
/// reset, which makes the core testable with a plain mock.
pub trait FirmwareHooks {
    /// Called for command `0x02`, before [`reset`](FirmwareHooks::reset):
    /// mark that the device should stay in the loader and wait for a
    /// firmware image after the coming reset.
    fn prepare_programming(&mut self);

    /// Called for commands `0x01` and `0x02`: trigger a device reset.
    ///
    /// On real hardware this usually does not return. The protocol state
    /// is already cleared when this is invoked, so a mock implementation
    /// that does return leaves the state machine idle.
    fn reset(&mut self);
}

/// Transfer phase, see [`Transfer`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    /// Waiting for a command packet.
    Idle,
    /// Receiving firmware payload; packets are not interpreted as commands.
    Streaming,
}

/// A reply due on the IN endpoint.
///
/// Replies are best-effort: if the previous reply is still in flight
/// the new one is dropped and the host has to re-issue the command.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Reply {
    /// Echo of a status query: `[0x03, 0x01]`.
    Status,
    /// End of a streamed transfer: `[0x04, checksum_lo, checksum_hi]`.
    Done {
        /// Wrapping 16-bit sum of every payload byte of the session.
        checksum: u16,
    },
}

impl Reply {
    /// Encode the reply into a full packet. Unused bytes are zeroed.
    pub fn encode(&self, buf: &mut [u8; PACKET_SIZE]) {
        buf.fill(0);
        match *self {
            Reply::Status => {
                buf[0] = CMD_STATUS;
                buf[1] = STATUS_READY_IN_LOADER;
            }
            Reply::Done { checksum } => {
                buf[0] = CMD_BEGIN_STREAM;
                buf[1] = (checksum & 0xff) as u8;
                buf[2] = (checksum >> 8) as u8;
            }
        }
    }
}

/// Persistent protocol context: the command processor.
///
/// Owns the streaming bookkeeping (declared size, bytes consumed so far,
/// running checksum). Created once, mutated per packet, reset to idle
/// when a transfer completes or a reset command arrives.
pub struct Transfer {
    phase: Phase,
    /// Declared total image size, valid while `Streaming`.
    expected: u32,
    consumed: u32,
    checksum: u16,
}

impl Transfer {
    /// New idle transfer context.
    pub const fn new() -> Self {
        Self {
            phase: Phase::Idle,
            expected: 0,
            consumed: 0,
            checksum: 0,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Payload bytes received in the current session.
    pub fn bytes_consumed(&self) -> u32 {
        self.consumed
    }

    /// Drop any in-flight transfer and return to idle.
    pub fn abort(&mut self) {
        self.phase = Phase::Idle;
        self.expected = 0;
        self.consumed = 0;
        self.checksum = 0;
    }

    /// Process one drained OUT packet.
    ///
    /// Malformed input never panics and never corrupts the context:
    /// unrecognized commands and truncated headers are ignored.
    pub fn handle_packet<H: FirmwareHooks>(
        &mut self,
        packet: &[u8],
        hooks: &mut H,
    ) -> Option<Reply> {
        match self.phase {
            Phase::Idle => self.dispatch(packet, hooks),
            Phase::Streaming => self.consume(packet),
        }
    }

    fn dispatch<H: FirmwareHooks>(&mut self, packet: &[u8], hooks: &mut H) -> Option<Reply> {
        match *packet.first()? {
            CMD_RESET => {
                // No stale context may survive into the post-reset world.
                self.abort();
                hooks.reset();
                None
            }
            CMD_SCHEDULE_PROGRAM => {
                self.abort();
                hooks.prepare_programming();
                hooks.reset();
                None
            }
            CMD_STATUS => Some(Reply::Status),
            CMD_BEGIN_STREAM => self.begin_stream(packet),
            _ => None,
        }
    }

    fn begin_stream(&mut self, packet: &[u8]) -> Option<Reply> {
        if packet.len() < STREAM_HEADER {
            // Truncated header, treat like an unrecognized command.
            return None;
        }

        self.expected = (packet[SIZE_OFFSET] as u32)
            | ((packet[SIZE_OFFSET + 1] as u32) << 8)
            | ((packet[SIZE_OFFSET + 2] as u32) << 16)
            | ((packet[SIZE_OFFSET + 3] as u32) << 24);
        self.consumed = 0;
        self.checksum = 0;

        // Up to 56 payload bytes ride in the initiating packet.
        let avail = min(packet.len() - STREAM_HEADER, FIRST_CHUNK);
        let take = min(self.expected, avail as u32) as usize;
        self.accumulate(&packet[STREAM_HEADER..STREAM_HEADER + take]);

        if self.consumed >= self.expected {
            return Some(self.finish());
        }
        self.phase = Phase::Streaming;
        None
    }

    fn consume(&mut self, packet: &[u8]) -> Option<Reply> {
        let remaining = self.expected - self.consumed;
        let take = min(remaining, packet.len() as u32) as usize;
        // Bytes past `take` in the final packet are not part of the image.
        self.accumulate(&packet[..take]);

        if self.consumed >= self.expected {
            return Some(self.finish());
        }
        None
    }

    fn accumulate(&mut self, payload: &[u8]) {
        for b in payload {
            self.checksum = self.checksum.wrapping_add(*b as u16);
        }
        self.consumed += payload.len() as u32;
    }

    fn finish(&mut self) -> Reply {
        let checksum = self.checksum;
        self.abort();
        Reply::Done { checksum }
    }
}

impl Default for Transfer {
    fn default() -> Self {
        Self::new()
    }
}
