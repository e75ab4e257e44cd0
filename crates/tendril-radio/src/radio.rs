//! The radio transport trait and its supporting types.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::beacon::VendorMarker;
use crate::{ADDR_LEN, LMK_LEN};

/// A six-byte radio (MAC) address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RadioAddr(pub [u8; ADDR_LEN]);

impl RadioAddr {
    /// Wildcard address: matches any node. A requester presenting this
    /// address bypasses whitelist checks entirely (deliberate provisioning
    /// convenience; see the chain master's documentation).
    pub const ANY: RadioAddr = RadioAddr([0xFF; ADDR_LEN]);

    /// Broadcast to every node except the root.
    pub const BROADCAST: RadioAddr = RadioAddr([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE]);

    /// Whether this is the wildcard address.
    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }
}

impl fmt::Display for RadioAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = self.0.iter();
        if let Some(first) = parts.next() {
            write!(f, "{first:02x}")?;
        }
        for b in parts {
            write!(f, ":{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for RadioAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RadioAddr({self})")
    }
}

impl From<[u8; ADDR_LEN]> for RadioAddr {
    fn from(bytes: [u8; ADDR_LEN]) -> Self {
        Self(bytes)
    }
}

/// Fixed transport pipes multiplexing unrelated traffic over one radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Pipe {
    /// Debug traffic: logs, coredumps, acks
    Debug = 0,
    /// Device control
    Control = 1,
    /// Network provisioning (the chain protocol)
    Provision = 2,
    /// Reserved for future use
    Reserved = 3,
}

impl Pipe {
    /// Number of pipes.
    pub const COUNT: usize = 4;

    /// Pipe index for table lookups.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One frame seen by the promiscuous marker filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRecord {
    /// Advertiser address
    pub addr: RadioAddr,
    /// Received signal strength, dBm
    pub rssi: i8,
}

/// Callback invoked for every beacon frame matching an installed marker
/// filter. Runs in the radio's receive context; must not block.
pub type MarkerSink = Arc<dyn Fn(ScanRecord) + Send + Sync>;

/// Radio transport errors.
#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    /// Bounded wait elapsed with nothing to deliver
    #[error("radio operation timed out")]
    Timeout,

    /// Send attempted to a peer that was never registered
    #[error("peer not registered: {0}")]
    PeerNotRegistered(RadioAddr),

    /// Message exceeds the transport ceiling
    #[error("payload too large: {len} bytes, maximum {max}")]
    PayloadTooLarge {
        /// Message length
        len: usize,
        /// Transport ceiling
        max: usize,
    },

    /// Channel outside the valid range
    #[error("invalid channel: {0}")]
    InvalidChannel(u8),

    /// Radio shut down
    #[error("radio is closed")]
    Closed,

    /// Backend-specific failure
    #[error("radio error: {0}")]
    Backend(String),
}

/// The connectionless radio contract consumed by the provisioning chain.
///
/// Point-to-point sessions are explicitly scoped: every send/receive exchange
/// with a peer is bracketed by [`Radio::add_peer`] / [`Radio::remove_peer`].
/// Registering with a local master key (LMK) makes the leg encrypted at the
/// radio layer; `None` leaves it plaintext.
#[async_trait]
pub trait Radio: Send + Sync {
    /// Our own radio address.
    fn local_addr(&self) -> RadioAddr;

    /// Open a point-to-point session with `addr`.
    async fn add_peer(&self, addr: RadioAddr, lmk: Option<[u8; LMK_LEN]>)
    -> Result<(), RadioError>;

    /// Close the point-to-point session with `addr`.
    async fn remove_peer(&self, addr: RadioAddr) -> Result<(), RadioError>;

    /// Send one message to a registered peer. `wait` bounds delivery into the
    /// transport; `None` waits indefinitely.
    async fn send(
        &self,
        pipe: Pipe,
        dest: RadioAddr,
        data: &[u8],
        wait: Option<Duration>,
    ) -> Result<(), RadioError>;

    /// Receive one message on a pipe into `buf`, returning the source address
    /// and message length. `wait` bounds the wait; `None` waits indefinitely.
    async fn receive(
        &self,
        pipe: Pipe,
        buf: &mut [u8],
        wait: Option<Duration>,
    ) -> Result<(RadioAddr, usize), RadioError>;

    /// Attach a vendor marker to outgoing beacon frames.
    fn set_beacon_marker(&self, marker: VendorMarker);

    /// Stop advertising the vendor marker.
    fn clear_beacon_marker(&self);

    /// Install a promiscuous filter: `sink` is invoked for every management
    /// frame carrying `marker`. Replaces any previous filter.
    fn install_marker_filter(&self, marker: VendorMarker, sink: MarkerSink);

    /// Remove the promiscuous filter and leave monitor mode.
    fn clear_marker_filter(&self);

    /// Current radio channel.
    fn channel(&self) -> u8;

    /// Switch the radio channel.
    fn set_channel(&self, channel: u8) -> Result<(), RadioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_display() {
        let addr = RadioAddr([0x18, 0xFE, 0x34, 0x00, 0xAB, 0x01]);
        assert_eq!(addr.to_string(), "18:fe:34:00:ab:01");
    }

    #[test]
    fn wildcard_detection() {
        assert!(RadioAddr::ANY.is_any());
        assert!(!RadioAddr::BROADCAST.is_any());
        assert!(!RadioAddr([0; 6]).is_any());
    }
}
