#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
//!
//! Implements a vendor-specific bulk firmware-loader protocol for a
//! `usb-device` device.
//!
//! ## About
//!
//! The host side of this protocol sends fixed 64-byte packets to a
//! bulk OUT endpoint. The first byte of a packet is a command: reset,
//! reset-into-programming, status query, or "the rest of this is a
//! firmware image". For the latter, a 32-bit size field declares the
//! image length, and every following packet is raw payload until that
//! many bytes arrived; the device then answers with a 16-bit checksum
//! of the image on the bulk IN endpoint.
//!
//! This library is a protocol implementation only. What "prepare for
//! programming" and "reset" actually do on a particular board is
//! provided by the library user through the [`FirmwareHooks`] trait;
//! writing the received image to flash is expected to happen in the
//! loader that runs after the reset.
//!
//! Three receive buffers are rotated round-robin so the bus can accept
//! bursts of host packets while firmware is still busy with an older
//! one. Packets are always processed in host-send order.
//!
//! ### Replies
//!
//! Replies are best-effort: at most one is in flight, and a reply that
//! becomes due while the previous one is still unacknowledged is
//! dropped. A host that needs the answer re-issues the command.
//!
//! ## Example
//!
//! The example focuses on [`LoaderClass`]; target controller setup
//! (USB peripheral, clocks, interrupts) is out of scope and is covered
//! by the documentation of the HAL crate for the target device.
//!
//! ```no_run
//! use usb_device::prelude::*;
//! use usb_device::bus::{UsbBus, UsbBusAllocator};
//! use usbd_bulkloader::*;
//!
//! // LoaderClass calls into Board at the protocol's reset points.
//! struct Board;
//!
//! impl FirmwareHooks for Board {
//!     fn prepare_programming(&mut self) {
//!         // e.g. set a magic "stay in loader" flag in backup RAM
//!     }
//!
//!     fn reset(&mut self) {
//!         // e.g. SCB::sys_reset()
//!     }
//! }
//!
//! fn run<B: UsbBus>(usb_bus_alloc: &UsbBusAllocator<B>) -> ! {
//!     let mut loader = LoaderClass::new(usb_bus_alloc, Board);
//!
//!     let mut usb_dev = UsbDeviceBuilder::new(usb_bus_alloc, UsbVidPid(0x04d8, 0x0053))
//!         .build();
//!
//!     loop {
//!         // Each poll services the endpoints and drains at most one
//!         // received packet through the command processor.
//!         usb_dev.poll(&mut [&mut loader]);
//!     }
//! }
//! ```
//!

/// USB class glue
pub mod class;
/// Command and streaming state machine
pub mod proto;
/// Receive slot rotation, reply staging
pub mod rotator;

#[doc(inline)]
pub use crate::class::LoaderClass;
#[doc(inline)]
pub use crate::proto::{FirmwareHooks, Phase, Reply, Transfer, PACKET_SIZE};
#[doc(inline)]
pub use crate::rotator::{ReplySlot, SlotRing, NUM_SLOTS};
