//! Network-configuration records and the device whitelist.
//!
//! [`NetworkConfig`] is the payload the whole protocol exists to move: the
//! mesh/AP credentials, an application payload block, and the whitelist of
//! devices allowed to receive configuration from a master. On the wire it is
//! a packed little-endian struct — a fixed 356-byte header followed by the
//! variable whitelist bytes — but in memory the whitelist lives in its own
//! buffer with an explicit length, not a trailing flexible array.

use tendril_crypto::rsa::pubkey_checksum;
use tendril_crypto::CHECKSUM_LEN;
use tendril_radio::RadioAddr;

use crate::error::WireError;
use crate::{APP_PAYLOAD_BODY_LEN, APP_PAYLOAD_LEN, CONFIG_HEADER_LEN, MESH_CONFIG_LEN,
            WHITELIST_ENTRY_LEN};

/// Role a node assumes inside the mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum MeshRole {
    /// Not yet decided; the self-organizing election picks one
    #[default]
    Idle = 0,
    /// Root node, bridging the mesh to the router
    Root = 1,
    /// Intermediate node, forwarding for its children
    Node = 2,
    /// Leaf node, never accepts children
    Leaf = 3,
}

impl TryFrom<u8> for MeshRole {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Idle),
            1 => Ok(Self::Root),
            2 => Ok(Self::Node),
            3 => Ok(Self::Leaf),
            other => Err(WireError::InvalidRole(other)),
        }
    }
}

/// Mesh/AP credentials — the 176-byte block every slave ultimately wants.
///
/// String fields are fixed cells, zero-padded; use the `*_str` accessors for
/// the text up to the first NUL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshConfig {
    /// Router SSID cell
    pub router_ssid: [u8; 32],
    /// Router password cell
    pub router_password: [u8; 64],
    /// Router BSSID; zero when any BSSID is acceptable
    pub router_bssid: RadioAddr,
    /// Mesh network identifier
    pub mesh_id: [u8; 6],
    /// Mesh-internal password cell
    pub mesh_password: [u8; 64],
    /// Designated role
    pub mesh_type: MeshRole,
    /// Wi-Fi channel shared by mesh and router
    pub channel: u8,
    /// Keep the configured channel even when the router is missing
    pub channel_switch_disable: bool,
    /// Keep the configured BSSID even when that router disappears
    pub router_switch_disable: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            router_ssid: [0; 32],
            router_password: [0; 64],
            router_bssid: RadioAddr([0; 6]),
            mesh_id: [0; 6],
            mesh_password: [0; 64],
            mesh_type: MeshRole::Idle,
            channel: 0,
            channel_switch_disable: false,
            router_switch_disable: false,
        }
    }
}

impl MeshConfig {
    /// Set the router SSID and password, truncated to their cells.
    pub fn set_router(&mut self, ssid: &str, password: &str) {
        copy_str(&mut self.router_ssid, ssid);
        copy_str(&mut self.router_password, password);
    }

    /// Set the mesh ID and mesh password, truncated to their cells.
    pub fn set_mesh(&mut self, mesh_id: [u8; 6], password: &str) {
        self.mesh_id = mesh_id;
        copy_str(&mut self.mesh_password, password);
    }

    /// Router SSID up to the first NUL.
    pub fn router_ssid_str(&self) -> &str {
        cell_str(&self.router_ssid)
    }

    /// Mesh password up to the first NUL.
    pub fn mesh_password_str(&self) -> &str {
        cell_str(&self.mesh_password)
    }

    fn encode(&self, out: &mut [u8]) {
        out[..32].copy_from_slice(&self.router_ssid);
        out[32..96].copy_from_slice(&self.router_password);
        out[96..102].copy_from_slice(&self.router_bssid.0);
        out[102..108].copy_from_slice(&self.mesh_id);
        out[108..172].copy_from_slice(&self.mesh_password);
        out[172] = self.mesh_type as u8;
        out[173] = self.channel;
        out[174] = u8::from(self.channel_switch_disable);
        out[175] = u8::from(self.router_switch_disable);
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut config = Self::default();
        config.router_ssid.copy_from_slice(&data[..32]);
        config.router_password.copy_from_slice(&data[32..96]);
        config.router_bssid.0.copy_from_slice(&data[96..102]);
        config.mesh_id.copy_from_slice(&data[102..108]);
        config.mesh_password.copy_from_slice(&data[108..172]);
        config.mesh_type = MeshRole::try_from(data[172])?;
        config.channel = data[173];
        config.channel_switch_disable = data[174] != 0;
        config.router_switch_disable = data[175] != 0;
        Ok(config)
    }
}

/// The application payload block riding along with the mesh credentials.
///
/// The two arms share one 174-byte wire cell; a tag byte says which is live
/// (the original inferred it from build flags — here it is explicit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppPayload {
    /// Mesh-initialization parameter block, used by debug builds to push
    /// tuning parameters alongside credentials
    InitParams([u8; APP_PAYLOAD_BODY_LEN]),
    /// Application-defined bytes, vendor-extensible up to the cell size
    Custom([u8; APP_PAYLOAD_BODY_LEN]),
}

impl Default for AppPayload {
    fn default() -> Self {
        Self::Custom([0; APP_PAYLOAD_BODY_LEN])
    }
}

impl AppPayload {
    const TAG_INIT_PARAMS: u8 = 0;
    const TAG_CUSTOM: u8 = 1;

    /// Custom payload from a caller slice, truncated to the cell.
    pub fn custom(data: &[u8]) -> Self {
        let mut body = [0u8; APP_PAYLOAD_BODY_LEN];
        let len = data.len().min(APP_PAYLOAD_BODY_LEN);
        body[..len].copy_from_slice(&data[..len]);
        Self::Custom(body)
    }

    fn encode(&self, out: &mut [u8]) {
        let (tag, body) = match self {
            Self::InitParams(body) => (Self::TAG_INIT_PARAMS, body),
            Self::Custom(body) => (Self::TAG_CUSTOM, body),
        };
        out[0] = tag;
        out[1..1 + APP_PAYLOAD_BODY_LEN].copy_from_slice(body);
        // bytes 175..178 reserved for format evolution, zeroed
        out[1 + APP_PAYLOAD_BODY_LEN..APP_PAYLOAD_LEN].fill(0);
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut body = [0u8; APP_PAYLOAD_BODY_LEN];
        body.copy_from_slice(&data[1..1 + APP_PAYLOAD_BODY_LEN]);

        match data[0] {
            Self::TAG_INIT_PARAMS => Ok(Self::InitParams(body)),
            Self::TAG_CUSTOM => Ok(Self::Custom(body)),
            other => Err(WireError::InvalidPayloadTag(other)),
        }
    }
}

/// One whitelist entry: a radio address bound to a public-key checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhitelistEntry {
    /// Device radio address
    pub addr: RadioAddr,
    /// MD5 checksum of the device's public-key PEM cell
    pub checksum: [u8; CHECKSUM_LEN],
}

impl WhitelistEntry {
    /// Entry with an explicit checksum.
    pub fn new(addr: RadioAddr, checksum: [u8; CHECKSUM_LEN]) -> Self {
        Self { addr, checksum }
    }

    /// Entry whose checksum binds the address to the given public key.
    pub fn for_pubkey(addr: RadioAddr, pubkey_pem: &str) -> Self {
        Self {
            addr,
            checksum: pubkey_checksum(pubkey_pem),
        }
    }

    /// Entry with a zero checksum, for deployments that match on address
    /// alone.
    pub fn address_only(addr: RadioAddr) -> Self {
        Self {
            addr,
            checksum: [0; CHECKSUM_LEN],
        }
    }
}

/// The device whitelist distributed alongside the credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
}

impl Whitelist {
    /// Empty whitelist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitelist from entries.
    pub fn from_entries(entries: Vec<WhitelistEntry>) -> Self {
        Self { entries }
    }

    /// Append an entry.
    pub fn push(&mut self, entry: WhitelistEntry) {
        self.entries.push(entry);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the whitelist has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries.
    pub fn entries(&self) -> &[WhitelistEntry] {
        &self.entries
    }

    /// Serialized size in bytes. Always a multiple of
    /// [`WHITELIST_ENTRY_LEN`].
    pub fn byte_len(&self) -> usize {
        self.entries.len() * WHITELIST_ENTRY_LEN
    }

    /// Serialize to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for entry in &self.entries {
            out.extend_from_slice(&entry.addr.0);
            out.extend_from_slice(&entry.checksum);
        }
        out
    }

    /// Parse wire bytes.
    ///
    /// # Errors
    ///
    /// [`WireError::WhitelistAlignment`] unless the input is a whole number
    /// of entries.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() % WHITELIST_ENTRY_LEN != 0 {
            return Err(WireError::WhitelistAlignment(data.len()));
        }

        let entries = data
            .chunks_exact(WHITELIST_ENTRY_LEN)
            .map(|chunk| {
                let mut entry = WhitelistEntry::address_only(RadioAddr([0; 6]));
                entry.addr.0.copy_from_slice(&chunk[..6]);
                entry.checksum.copy_from_slice(&chunk[6..]);
                entry
            })
            .collect();

        Ok(Self { entries })
    }

    /// Whether a requester may receive configuration.
    ///
    /// A requester presenting the [`RadioAddr::ANY`] wildcard **bypasses the
    /// whitelist entirely**. This is the mechanism that lets a brand-new,
    /// never-whitelisted device be configured in direct/manual provisioning
    /// flows — and equally a policy hole if you assumed the whitelist was
    /// strict. Integrators wanting strict enforcement must reject wildcard
    /// requesters before this check.
    ///
    /// With `verify_checksum` set, a matching address additionally requires
    /// the requester's public key to hash to the stored checksum, preventing
    /// an attacker from borrowing a whitelisted address.
    pub fn permits(&self, addr: RadioAddr, pubkey_pem: &str, verify_checksum: bool) -> bool {
        if addr.is_any() {
            return true;
        }

        match self.entries.iter().find(|entry| entry.addr == addr) {
            None => false,
            Some(entry) => !verify_checksum || entry.checksum == pubkey_checksum(pubkey_pem),
        }
    }
}

/// The complete network-configuration record.
///
/// Assembled by a provisioning front-end (BLE or a prior chain hop) or loaded
/// from persistent storage; handed to application code through the
/// configuration queue by value, never by live reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Mesh/AP credentials
    pub mesh: MeshConfig,
    /// Application payload block
    pub payload: AppPayload,
    /// Devices permitted to receive configuration from a master
    pub whitelist: Whitelist,
}

impl NetworkConfig {
    /// Serialize the fixed header: mesh config, payload, and the whitelist
    /// byte count the trailing transfer will carry.
    pub fn encode_header(&self) -> [u8; CONFIG_HEADER_LEN] {
        let mut out = [0u8; CONFIG_HEADER_LEN];
        self.mesh.encode(&mut out[..MESH_CONFIG_LEN]);
        self.payload
            .encode(&mut out[MESH_CONFIG_LEN..MESH_CONFIG_LEN + APP_PAYLOAD_LEN]);
        let size = self.whitelist.byte_len() as u16;
        out[CONFIG_HEADER_LEN - 2..].copy_from_slice(&size.to_le_bytes());
        out
    }

    /// Parse a fixed header. The whitelist itself arrives separately; the
    /// returned config has an empty whitelist and the declared byte count is
    /// handed back for the receiver to bound that transfer.
    pub fn decode_header(data: &[u8]) -> Result<(Self, u16), WireError> {
        if data.len() != CONFIG_HEADER_LEN {
            return Err(WireError::UnexpectedLength {
                expected: CONFIG_HEADER_LEN,
                actual: data.len(),
            });
        }

        let mesh = MeshConfig::decode(&data[..MESH_CONFIG_LEN])?;
        let payload = AppPayload::decode(&data[MESH_CONFIG_LEN..MESH_CONFIG_LEN + APP_PAYLOAD_LEN])?;
        let whitelist_size =
            u16::from_le_bytes([data[CONFIG_HEADER_LEN - 2], data[CONFIG_HEADER_LEN - 1]]);

        Ok((
            Self {
                mesh,
                payload,
                whitelist: Whitelist::new(),
            },
            whitelist_size,
        ))
    }
}

fn copy_str(cell: &mut [u8], text: &str) {
    cell.fill(0);
    let len = text.len().min(cell.len());
    cell[..len].copy_from_slice(&text.as_bytes()[..len]);
}

fn cell_str(cell: &[u8]) -> &str {
    let end = cell.iter().position(|&b| b == 0).unwrap_or(cell.len());
    std::str::from_utf8(&cell[..end]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> NetworkConfig {
        let mut mesh = MeshConfig::default();
        mesh.set_router("backhaul", "hunter2hunter2");
        mesh.set_mesh([0x11, 0x22, 0x33, 0x44, 0x55, 0x66], "mesh-secret");
        mesh.mesh_type = MeshRole::Node;
        mesh.channel = 6;

        NetworkConfig {
            mesh,
            payload: AppPayload::custom(b"vendor blob"),
            whitelist: Whitelist::from_entries(vec![
                WhitelistEntry::address_only(RadioAddr([1, 2, 3, 4, 5, 6])),
                WhitelistEntry::address_only(RadioAddr([7, 8, 9, 10, 11, 12])),
            ]),
        }
    }

    #[test]
    fn header_round_trip() {
        let config = sample_config();
        let header = config.encode_header();

        let (decoded, whitelist_size) = NetworkConfig::decode_header(&header).unwrap();
        assert_eq!(decoded.mesh, config.mesh);
        assert_eq!(decoded.payload, config.payload);
        assert_eq!(whitelist_size as usize, config.whitelist.byte_len());
        assert!(decoded.whitelist.is_empty());
    }

    #[test]
    fn header_rejects_bad_role() {
        let mut header = sample_config().encode_header();
        header[172] = 9;
        assert!(matches!(
            NetworkConfig::decode_header(&header),
            Err(WireError::InvalidRole(9))
        ));
    }

    #[test]
    fn payload_tag_round_trip() {
        let mut cell = [0u8; APP_PAYLOAD_LEN];
        AppPayload::InitParams([7; APP_PAYLOAD_BODY_LEN]).encode(&mut cell);
        assert!(matches!(
            AppPayload::decode(&cell).unwrap(),
            AppPayload::InitParams(_)
        ));

        cell[0] = 0x7F;
        assert!(matches!(
            AppPayload::decode(&cell),
            Err(WireError::InvalidPayloadTag(0x7F))
        ));
    }

    #[test]
    fn whitelist_round_trip() {
        let whitelist = sample_config().whitelist;
        let bytes = whitelist.encode();
        assert_eq!(bytes.len(), whitelist.byte_len());
        assert_eq!(Whitelist::decode(&bytes).unwrap(), whitelist);
    }

    #[test]
    fn whitelist_rejects_misaligned_bytes() {
        let mut bytes = sample_config().whitelist.encode();
        bytes.push(0);
        assert!(matches!(
            Whitelist::decode(&bytes),
            Err(WireError::WhitelistAlignment(_))
        ));
    }

    #[test]
    fn permits_by_address() {
        let whitelist = sample_config().whitelist;
        assert!(whitelist.permits(RadioAddr([1, 2, 3, 4, 5, 6]), "irrelevant", false));
        assert!(!whitelist.permits(RadioAddr([9, 9, 9, 9, 9, 9]), "irrelevant", false));
    }

    #[test]
    fn wildcard_bypasses_whitelist() {
        let whitelist = Whitelist::new();
        assert!(whitelist.permits(RadioAddr::ANY, "irrelevant", true));
    }

    #[test]
    fn checksum_gates_when_verifying() {
        let pem = "-----BEGIN PUBLIC KEY-----\nabc\n-----END PUBLIC KEY-----\n";
        let addr = RadioAddr([1, 2, 3, 4, 5, 6]);
        let good = Whitelist::from_entries(vec![WhitelistEntry::for_pubkey(addr, pem)]);
        let bad = Whitelist::from_entries(vec![WhitelistEntry::address_only(addr)]);

        assert!(good.permits(addr, pem, true));
        assert!(!bad.permits(addr, pem, true));
        // Without verification the address match is enough
        assert!(bad.permits(addr, pem, false));
    }

    #[test]
    fn string_cells_truncate_and_read_back() {
        let mut mesh = MeshConfig::default();
        mesh.set_router(&"s".repeat(40), "pw");
        assert_eq!(mesh.router_ssid_str().len(), 32);
        assert_eq!(mesh.mesh_password_str(), "");
    }
}
