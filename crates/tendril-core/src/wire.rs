//! Wire framing for the chain handshake.
//!
//! Three messages cross the radio, all on the provisioning pipe:
//!
//! 1. Request, slave → master: the slave's public-key PEM body (header and
//!    footer lines stripped to save payload bytes) plus one byte of measured
//!    signal strength — [`REQUEST_LEN`] bytes exactly.
//! 2. Sealed record, master → slave: the first [`RSA_PLAINTEXT_MAX_LEN`]
//!    bytes of the credential record encrypted under the requester's RSA key,
//!    the remainder AES-CFB-encrypted under the fresh session key carried
//!    inside the RSA portion — [`RESPONSE_LEN`] bytes exactly.
//! 3. Optional whitelist, master → slave: zlib-compressed whitelist bytes,
//!    AES-CFB-encrypted under the same session key.
//!
//! Anything that is not exactly the expected size is unrelated traffic and is
//! discarded without ceremony.

use tendril_crypto::rsa::{pubkey_pem_body, pubkey_pem_from_body};
use tendril_crypto::{
    AES_KEY_LEN, RSA_CIPHERTEXT_LEN, RSA_PLAINTEXT_MAX_LEN, RSA_PUBKEY_PEM_BODY_LEN, aes_cfb, rsa,
};
use zeroize::Zeroizing;

use crate::config::NetworkConfig;
use crate::error::{Error, WireError};
use crate::CONFIG_HEADER_LEN;

/// Size of a provisioning request: stripped PEM body plus RSSI byte
pub const REQUEST_LEN: usize = RSA_PUBKEY_PEM_BODY_LEN + 1;

/// Size of the plaintext credential record: session key plus config header
pub const RECORD_LEN: usize = AES_KEY_LEN + CONFIG_HEADER_LEN;

/// Size of a sealed credential record on the wire
pub const RESPONSE_LEN: usize = RSA_CIPHERTEXT_LEN + (RECORD_LEN - RSA_PLAINTEXT_MAX_LEN);

/// A decoded provisioning request.
pub struct Request {
    /// Requester's public key, PEM framing restored
    pub pubkey_pem: String,
    /// Signal strength the requester measured on our beacons
    pub rssi: i8,
}

/// Build a provisioning request.
///
/// # Errors
///
/// [`tendril_crypto::CryptoError::Pem`] if the public key does not have the
/// expected wire shape.
pub fn encode_request(pubkey_pem: &str, rssi: i8) -> Result<Vec<u8>, Error> {
    let body = pubkey_pem_body(pubkey_pem)?;

    let mut out = Vec::with_capacity(REQUEST_LEN);
    out.extend_from_slice(&body);
    out.push(rssi as u8);
    Ok(out)
}

/// Parse a provisioning request.
///
/// # Errors
///
/// [`WireError::UnexpectedLength`] unless the message is exactly
/// [`REQUEST_LEN`] bytes; PEM errors if the body is not key text.
pub fn decode_request(data: &[u8]) -> Result<Request, Error> {
    if data.len() != REQUEST_LEN {
        return Err(WireError::UnexpectedLength {
            expected: REQUEST_LEN,
            actual: data.len(),
        }
        .into());
    }

    let mut body = [0u8; RSA_PUBKEY_PEM_BODY_LEN];
    body.copy_from_slice(&data[..RSA_PUBKEY_PEM_BODY_LEN]);

    Ok(Request {
        pubkey_pem: pubkey_pem_from_body(&body)?,
        rssi: data[RSA_PUBKEY_PEM_BODY_LEN] as i8,
    })
}

/// Seal a credential record for one requester.
///
/// Lays out `session_key ‖ config_header`, RSA-encrypts the leading
/// [`RSA_PLAINTEXT_MAX_LEN`] bytes under the requester's public key, and
/// AES-CFB-encrypts the remainder under the session key itself. The session
/// key therefore only ever travels inside the RSA envelope.
///
/// # Errors
///
/// Crypto errors from the RSA layer; these abandon the current handshake.
pub fn seal_record(
    session_key: &[u8; AES_KEY_LEN],
    config: &NetworkConfig,
    pubkey_pem: &str,
) -> Result<Vec<u8>, Error> {
    let mut plain = Zeroizing::new([0u8; RECORD_LEN]);
    plain[..AES_KEY_LEN].copy_from_slice(session_key);
    plain[AES_KEY_LEN..].copy_from_slice(&config.encode_header());

    let mut out = rsa::encrypt(&plain[..RSA_PLAINTEXT_MAX_LEN], pubkey_pem)?;

    let mut tail = plain[RSA_PLAINTEXT_MAX_LEN..].to_vec();
    aes_cfb::cfb_encrypt(session_key, &mut tail);
    out.extend_from_slice(&tail);

    debug_assert_eq!(out.len(), RESPONSE_LEN);
    Ok(out)
}

/// Open a sealed credential record.
///
/// Returns the session key (needed for the whitelist transfer), the config
/// with its header fields populated, and the declared whitelist byte count.
///
/// # Errors
///
/// [`WireError::UnexpectedLength`] unless the message is exactly
/// [`RESPONSE_LEN`] bytes — callers treat that as unrelated traffic. Crypto
/// errors mean a mismatched key or tampering; the attempt is abandoned.
pub fn open_record(
    data: &[u8],
    privkey_pem: &str,
) -> Result<([u8; AES_KEY_LEN], NetworkConfig, u16), Error> {
    if data.len() != RESPONSE_LEN {
        return Err(WireError::UnexpectedLength {
            expected: RESPONSE_LEN,
            actual: data.len(),
        }
        .into());
    }

    let head = rsa::decrypt(&data[..RSA_CIPHERTEXT_LEN], privkey_pem)?;
    if head.len() != RSA_PLAINTEXT_MAX_LEN {
        return Err(WireError::UnexpectedLength {
            expected: RSA_PLAINTEXT_MAX_LEN,
            actual: head.len(),
        }
        .into());
    }

    let mut session_key = [0u8; AES_KEY_LEN];
    session_key.copy_from_slice(&head[..AES_KEY_LEN]);

    let mut plain = Zeroizing::new([0u8; RECORD_LEN]);
    plain[..RSA_PLAINTEXT_MAX_LEN].copy_from_slice(&head);
    plain[RSA_PLAINTEXT_MAX_LEN..].copy_from_slice(&data[RSA_CIPHERTEXT_LEN..]);
    aes_cfb::cfb_decrypt(&session_key, &mut plain[RSA_PLAINTEXT_MAX_LEN..]);

    let (config, whitelist_size) = NetworkConfig::decode_header(&plain[AES_KEY_LEN..])?;
    Ok((session_key, config, whitelist_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppPayload, MeshConfig, MeshRole};
    use tendril_crypto::rsa::generate_keypair;

    fn sample_config() -> NetworkConfig {
        let mut mesh = MeshConfig::default();
        mesh.set_router("backhaul", "correct horse battery");
        mesh.set_mesh([0xAA; 6], "mesh-secret");
        mesh.mesh_type = MeshRole::Root;
        mesh.channel = 11;

        NetworkConfig {
            mesh,
            payload: AppPayload::custom(b"app data"),
            whitelist: crate::config::Whitelist::new(),
        }
    }

    #[test]
    fn request_round_trip() {
        let pair = generate_keypair().unwrap();

        let encoded = encode_request(&pair.public_pem, -61).unwrap();
        assert_eq!(encoded.len(), REQUEST_LEN);

        let request = decode_request(&encoded).unwrap();
        assert_eq!(request.pubkey_pem, pair.public_pem);
        assert_eq!(request.rssi, -61);
    }

    #[test]
    fn request_rejects_wrong_size() {
        assert!(matches!(
            decode_request(&[0u8; REQUEST_LEN - 1]),
            Err(Error::Wire(WireError::UnexpectedLength { .. }))
        ));
    }

    #[test]
    fn sealed_record_round_trip() {
        let pair = generate_keypair().unwrap();
        let config = sample_config();
        let key = [0x5Au8; AES_KEY_LEN];

        let sealed = seal_record(&key, &config, &pair.public_pem).unwrap();
        assert_eq!(sealed.len(), RESPONSE_LEN);

        let (session_key, opened, whitelist_size) =
            open_record(&sealed, &pair.private_pem).unwrap();
        assert_eq!(session_key, key);
        assert_eq!(opened.mesh, config.mesh);
        assert_eq!(opened.payload, config.payload);
        assert_eq!(whitelist_size, 0);
    }

    #[test]
    fn open_rejects_wrong_size() {
        let pair = generate_keypair().unwrap();
        assert!(matches!(
            open_record(&[0u8; RESPONSE_LEN + 1], &pair.private_pem),
            Err(Error::Wire(WireError::UnexpectedLength { .. }))
        ));
    }

    #[test]
    fn open_with_wrong_key_is_crypto_error() {
        let pair = generate_keypair().unwrap();
        let other = generate_keypair().unwrap();
        let sealed = seal_record(&[1u8; AES_KEY_LEN], &sample_config(), &pair.public_pem).unwrap();

        assert!(matches!(
            open_record(&sealed, &other.private_pem),
            Err(Error::Crypto(_))
        ));
    }
}
