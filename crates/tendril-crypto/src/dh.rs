//! Finite-field Diffie-Hellman agreement.
//!
//! The provisioning front-ends hand this module the peer's serialized domain
//! parameters (modulus `P`, generator `G`, and the peer's public value `G^Y`,
//! each length-prefixed big-endian). We answer with our own public value and a
//! 16-byte key seed derived from the shared secret through a one-way hash.
//! The raw shared secret never leaves this module.

use md5::{Digest, Md5};
use num_bigint_dig::BigUint;
use zeroize::Zeroize;

use crate::random::secure_random;
use crate::{AES_KEY_LEN, CryptoError, DH_KEY_LEN};

/// Result of answering a peer's DH parameters.
pub struct DhAgreement {
    /// Our public value `G^X mod P`, big-endian, padded to the modulus size.
    /// Sent back to the peer.
    pub public_key: Vec<u8>,
    /// One-way-hashed shared secret, sized for use as an AES key.
    pub key_seed: [u8; AES_KEY_LEN],
}

/// Parse peer parameters, generate an ephemeral exponent, and complete the
/// agreement.
///
/// Parameter wire format, all lengths 2-byte big-endian:
/// `len ‖ P ‖ len ‖ G ‖ len ‖ G^Y`.
///
/// # Errors
///
/// Returns [`CryptoError::DhParams`] for truncated or degenerate parameters
/// and [`CryptoError::RandomFailed`] if the entropy source fails.
pub fn respond(params: &[u8]) -> Result<DhAgreement, CryptoError> {
    if params.is_empty() {
        return Err(CryptoError::InvalidArgument("empty DH parameters"));
    }

    let mut cursor = params;
    let p_bytes = read_field(&mut cursor)?;
    let g_bytes = read_field(&mut cursor)?;
    let gy_bytes = read_field(&mut cursor)?;

    if p_bytes.len() > DH_KEY_LEN {
        return Err(CryptoError::DhParams("modulus larger than supported"));
    }

    let p = BigUint::from_bytes_be(p_bytes);
    let g = BigUint::from_bytes_be(g_bytes);
    let gy = BigUint::from_bytes_be(gy_bytes);

    let one = BigUint::from(1u32);
    let two = BigUint::from(2u32);

    if p < BigUint::from(u64::MAX) || p.clone() % &two == BigUint::from(0u32) {
        return Err(CryptoError::DhParams("modulus too small or even"));
    }

    if g < two || g >= p {
        return Err(CryptoError::DhParams("generator out of range"));
    }

    // A peer value of 0, 1, or P-1 forces the secret into a guessable
    // subgroup
    if gy < two || gy >= p.clone() - &one {
        return Err(CryptoError::DhParams("peer public value out of range"));
    }

    // Ephemeral exponent X in [2, P-1)
    let mut raw = [0u8; DH_KEY_LEN];
    secure_random(&mut raw)?;
    let x = BigUint::from_bytes_be(&raw) % (p.clone() - BigUint::from(3u32)) + &two;
    raw.zeroize();

    let public = g.modpow(&x, &p);
    let mut shared = gy.modpow(&x, &p).to_bytes_be();

    // Hash over the fixed key-material width, secret right-aligned
    let mut padded = [0u8; DH_KEY_LEN];
    padded[DH_KEY_LEN - shared.len()..].copy_from_slice(&shared);
    let key_seed: [u8; AES_KEY_LEN] = Md5::digest(padded).into();

    shared.zeroize();
    padded.zeroize();

    // Pad our public value to the modulus size, as the peer expects
    let public_bytes = public.to_bytes_be();
    let mut public_key = vec![0u8; p_bytes.len()];
    public_key[p_bytes.len() - public_bytes.len()..].copy_from_slice(&public_bytes);

    Ok(DhAgreement {
        public_key,
        key_seed,
    })
}

fn read_field<'a>(cursor: &mut &'a [u8]) -> Result<&'a [u8], CryptoError> {
    if cursor.len() < 2 {
        return Err(CryptoError::DhParams("truncated length prefix"));
    }

    let len = u16::from_be_bytes([cursor[0], cursor[1]]) as usize;

    if cursor.len() < 2 + len || len == 0 {
        return Err(CryptoError::DhParams("truncated field"));
    }

    let (field, rest) = cursor[2..].split_at(len);
    *cursor = rest;
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 2409 Oakley group 2, 1024-bit MODP
    const MODP_1024: &str = "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E08\
                             8A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B\
                             302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9\
                             A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE6\
                             49286651ECE65381FFFFFFFFFFFFFFFF";

    fn modp_p() -> BigUint {
        let bytes = hex::decode(MODP_1024.replace(char::is_whitespace, "")).unwrap();
        BigUint::from_bytes_be(&bytes)
    }

    fn encode_params(p: &BigUint, g: &BigUint, gy: &BigUint) -> Vec<u8> {
        let mut out = Vec::new();
        for v in [p, g, gy] {
            let bytes = v.to_bytes_be();
            out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
            out.extend_from_slice(&bytes);
        }
        out
    }

    #[test]
    fn agreement_matches_peer_side() {
        let p = modp_p();
        let g = BigUint::from(2u32);

        // Peer's side of the exchange
        let y = BigUint::from_bytes_be(&[0x5Au8; 64]);
        let gy = g.modpow(&y, &p);

        let params = encode_params(&p, &g, &gy);
        let agreement = respond(&params).unwrap();
        assert_eq!(agreement.public_key.len(), DH_KEY_LEN);

        // Peer derives the same seed from our public value
        let gx = BigUint::from_bytes_be(&agreement.public_key);
        let shared = gx.modpow(&y, &p).to_bytes_be();
        let mut padded = [0u8; DH_KEY_LEN];
        padded[DH_KEY_LEN - shared.len()..].copy_from_slice(&shared);
        let peer_seed: [u8; AES_KEY_LEN] = Md5::digest(padded).into();

        assert_eq!(agreement.key_seed, peer_seed);
    }

    #[test]
    fn rejects_truncated_params() {
        let p = modp_p();
        let g = BigUint::from(2u32);
        let gy = g.modpow(&BigUint::from(7u32), &p);

        let params = encode_params(&p, &g, &gy);
        assert!(matches!(
            respond(&params[..params.len() - 4]),
            Err(CryptoError::DhParams(_))
        ));
    }

    #[test]
    fn rejects_degenerate_peer_value() {
        let p = modp_p();
        let g = BigUint::from(2u32);

        for gy in [BigUint::from(0u32), BigUint::from(1u32), p.clone() - BigUint::from(1u32)] {
            let params = encode_params(&p, &g, &gy);
            assert!(matches!(respond(&params), Err(CryptoError::DhParams(_))));
        }
    }

    #[test]
    fn rejects_even_modulus() {
        let p = modp_p() + BigUint::from(1u32);
        let g = BigUint::from(2u32);
        let gy = BigUint::from(4u32);

        let params = encode_params(&p, &g, &gy);
        assert!(matches!(respond(&params), Err(CryptoError::DhParams(_))));
    }
}
