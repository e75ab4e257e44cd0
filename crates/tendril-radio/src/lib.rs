//! # TENDRIL Radio
//!
//! The connectionless radio contract the provisioning chain runs over, and an
//! in-memory implementation of it for tests and host-side simulation.
//!
//! The real transport on a device is a vendor radio primitive (ESPNOW-class:
//! unreliable, broadcast-medium, ~hundreds of bytes per message, fragmentation
//! handled below this contract). This crate only specifies what the chain
//! protocol consumes:
//!
//! - point-to-point [`Radio::send`] / [`Radio::receive`] with bounded waits,
//!   multiplexed over fixed [`Pipe`]s
//! - [`Radio::add_peer`] / [`Radio::remove_peer`] session scoping, bracketing
//!   every exchange
//! - a vendor [`beacon::VendorMarker`] attached to outgoing beacon frames, and
//!   a promiscuous filter delivering [`ScanRecord`]s for matching frames
//! - channel get/set for the slave's scan hopping

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod beacon;
pub mod memory;
pub mod radio;

pub use beacon::{PROVISION_MARKER, VENDOR_OUI, VendorMarker};
pub use memory::{MemoryHub, MemoryRadio};
pub use radio::{MarkerSink, Pipe, Radio, RadioAddr, RadioError, ScanRecord};

/// Radio address length (MAC-style)
pub const ADDR_LEN: usize = 6;

/// Number of Wi-Fi channels the slave hops across while scanning
pub const CHANNEL_MAX: u8 = 13;

/// Largest message accepted by [`Radio::send`]; fragmentation into on-air
/// frames happens below this contract
pub const MAX_MESSAGE_LEN: usize = 1024;

/// Local-master-key length for encrypted point-to-point legs
pub const LMK_LEN: usize = 16;
