//! # TENDRIL Core
//!
//! The provisioning chain protocol: an already-configured **master** node
//! advertises availability through a beacon vendor marker; an unconfigured
//! **slave** scans for the marker, requests credentials with its RSA public
//! key, and receives the network configuration encrypted under a fresh
//! per-session AES key that only its private key can recover. A newly
//! configured slave can then run as master and extend the chain one hop.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                     Chain state machines                   │
//! │   slave: scan → request → open → whitelist → publish       │
//! │   master: advertise → verify → seal → transmit (serial)    │
//! ├────────────────────────────────────────────────────────────┤
//! │            Wire framing / credential records               │
//! │   221-byte request, 383-byte sealed record, zlib whitelist │
//! ├────────────────────────────────────────────────────────────┤
//! │         Radio contract (tendril-radio, consumed)           │
//! │   pipes, peer brackets, beacon markers, channel hopping    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The only externally observable outcome is a [`NetworkConfig`] appearing in
//! the [`ConfigQueue`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod compress;
pub mod config;
pub mod error;
pub mod queue;
pub mod wire;

pub use chain::master::MasterOptions;
pub use chain::session::MasterSessions;
pub use chain::slave::{self, SlaveHandle, SlaveOptions};
pub use config::{AppPayload, MeshConfig, MeshRole, NetworkConfig, Whitelist, WhitelistEntry};
pub use error::{CompressError, Error, QueueError, WireError};
pub use queue::{ConfigQueue, WriteOutcome};

/// Serialized size of [`MeshConfig`]
pub const MESH_CONFIG_LEN: usize = 176;

/// Serialized size of [`AppPayload`] (tag + body + reserved)
pub const APP_PAYLOAD_LEN: usize = 178;

/// Capacity of an [`AppPayload`] body
pub const APP_PAYLOAD_BODY_LEN: usize = 174;

/// Serialized size of the fixed [`NetworkConfig`] header
/// (mesh config + payload + whitelist byte count)
pub const CONFIG_HEADER_LEN: usize = MESH_CONFIG_LEN + APP_PAYLOAD_LEN + 2;

/// Serialized size of one whitelist entry (address + checksum)
pub const WHITELIST_ENTRY_LEN: usize = 6 + tendril_crypto::CHECKSUM_LEN;
