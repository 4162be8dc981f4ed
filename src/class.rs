//! Vendor bulk loader USB class.

use usb_device::class_prelude::*;

use crate::proto::{FirmwareHooks, Reply, Transfer, PACKET_SIZE};
use crate::rotator::{ReplySlot, SlotRing};

const USB_CLASS_VENDOR_SPECIFIC: u8 = 0xFF;
const USB_SUBCLASS_NONE: u8 = 0x00;
const USB_PROTOCOL_NONE: u8 = 0x00;

/// Firmware loader class for the usb-device library.
///
/// Presents a vendor-specific interface with one bulk OUT and one bulk
/// IN endpoint, both 64 bytes. Host packets are deposited into a
/// three-slot receive ring by the endpoint callback and drained, one per
/// device poll, through the command processor. Replies go out on the IN
/// endpoint, at most one in flight.
pub struct LoaderClass<'a, B: UsbBus, H: FirmwareHooks> {
    iface: InterfaceNumber,
    ep_out: EndpointOut<'a, B>,
    ep_in: EndpointIn<'a, B>,
    slots: SlotRing,
    reply: ReplySlot,
    transfer: Transfer,
    hooks: H,
}

impl<B: UsbBus, H: FirmwareHooks> UsbClass<B> for LoaderClass<'_, B, H> {
    fn get_configuration_descriptors(
        &self,
        writer: &mut DescriptorWriter,
    ) -> usb_device::Result<()> {
        writer.interface(
            self.iface,
            USB_CLASS_VENDOR_SPECIFIC,
            USB_SUBCLASS_NONE,
            USB_PROTOCOL_NONE,
        )?;
        writer.endpoint(&self.ep_out)?;
        writer.endpoint(&self.ep_in)?;
        Ok(())
    }

    fn endpoint_out(&mut self, addr: EndpointAddress) {
        if addr != self.ep_out.address() {
            return;
        }

        // Move everything the bus has for us into armed slots. With all
        // three slots pending the packet stays on the bus side and the
        // host sees NAKs until a slot is drained.
        let ep = &self.ep_out;
        loop {
            match self.slots.receive(|buf| ep.read(buf)) {
                Ok(true) => {}
                Ok(false) | Err(_) => break,
            }
        }
    }

    fn endpoint_in_complete(&mut self, addr: EndpointAddress) {
        if addr == self.ep_in.address() {
            self.reply.completed();
        }
    }

    fn reset(&mut self) {
        self.slots.reset();
        self.reply.reset();
        self.transfer.abort();
    }

    fn poll(&mut self) {
        self.poll_once();
    }
}

impl<'a, B: UsbBus, H: FirmwareHooks> LoaderClass<'a, B, H> {
    /// Creates a new LoaderClass with the provided UsbBus and
    /// FirmwareHooks.
    pub fn new(alloc: &'a UsbBusAllocator<B>, hooks: H) -> Self {
        Self {
            iface: alloc.interface(),
            ep_out: alloc.bulk(PACKET_SIZE as u16),
            ep_in: alloc.bulk(PACKET_SIZE as u16),
            slots: SlotRing::new(),
            reply: ReplySlot::new(),
            transfer: Transfer::new(),
            hooks,
        }
    }

    /// Current transfer state, mostly for diagnostics.
    pub fn transfer(&self) -> &Transfer {
        &self.transfer
    }

    /// Access to the injected firmware hooks.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Drain at most one received packet through the command processor.
    ///
    /// Runs as one of the final steps of every `usb_dev.poll([..])`. A
    /// call with no pending packet is a no-op, so the outer loop may
    /// poll as often as it likes; its frequency bounds worst-case
    /// packet latency.
    pub fn poll_once(&mut self) {
        let Some(packet) = self.slots.peek() else {
            return;
        };
        let reply = self.transfer.handle_packet(packet, &mut self.hooks);
        self.slots.release();

        if let Some(reply) = reply {
            self.send_reply(reply);
        }
    }

    fn send_reply(&mut self, reply: Reply) {
        // Best effort: while the previous reply is unacknowledged this
        // one is dropped and the host has to re-issue the command.
        let Some(frame) = self.reply.stage(reply) else {
            return;
        };
        if self.ep_in.write(frame).is_ok() {
            self.reply.sent();
        }
    }
}
