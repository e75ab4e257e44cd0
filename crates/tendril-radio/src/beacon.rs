//! Vendor-specific beacon marker.
//!
//! A configured master signals availability by attaching a four-byte vendor
//! information element to its outgoing beacon frames: a three-byte
//! organizational identifier plus a subtype byte. Scanning slaves filter
//! management frames for exactly this shape.

/// The organizational identifier carried in every TENDRIL vendor element.
pub const VENDOR_OUI: [u8; 3] = [0x18, 0xFE, 0x34];

/// Subtype byte marking "network configuration available here".
const SUBTYPE_PROVISION: u8 = 0x0F;

/// A vendor information element: `{ oui[3], subtype }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VendorMarker {
    /// Organizational identifier
    pub oui: [u8; 3],
    /// Marker subtype
    pub subtype: u8,
}

/// The provisioning-availability marker.
pub const PROVISION_MARKER: VendorMarker = VendorMarker {
    oui: VENDOR_OUI,
    subtype: SUBTYPE_PROVISION,
};

impl VendorMarker {
    /// Serialized element payload.
    pub fn to_bytes(self) -> [u8; 4] {
        [self.oui[0], self.oui[1], self.oui[2], self.subtype]
    }

    /// Parse an element payload; `None` unless it is exactly one marker.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; 4] = bytes.try_into().ok()?;
        Some(Self {
            oui: [bytes[0], bytes[1], bytes[2]],
            subtype: bytes[3],
        })
    }
}
