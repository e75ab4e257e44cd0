//! Pinned-keypair partition image.
//!
//! When whitelist security pins device keys at provisioning time, the keypair
//! is written to a reserved partition instead of being generated at boot:
//! the private-key PEM in a [`RSA_PRIVKEY_PEM_LEN`]-byte cell at offset 0,
//! the public-key PEM in a [`RSA_PUBKEY_PEM_LEN`]-byte cell immediately
//! after. Cells are zero-padded past the PEM text.

use zeroize::Zeroizing;

use crate::rsa::RsaKeypairPem;
use crate::{
    KeystoreError, PEM_BEGIN_PRIVATE_KEY, PEM_BEGIN_PUBLIC_KEY, RSA_PRIVKEY_PEM_LEN,
    RSA_PUBKEY_PEM_LEN,
};

/// Offset of the public-key cell within the partition image.
pub const PUBKEY_OFFSET: usize = RSA_PRIVKEY_PEM_LEN;

/// Total size of the two key cells.
pub const PARTITION_MIN_LEN: usize = RSA_PRIVKEY_PEM_LEN + RSA_PUBKEY_PEM_LEN;

/// Load a pinned keypair from a partition image.
///
/// # Errors
///
/// Any [`KeystoreError`] here is a fatal configuration error: a device
/// configured for pinned keys with an unreadable image must not fall back to
/// generating a fresh keypair, as the whitelist checksum on the master side
/// was computed against the pinned public key.
pub fn load_pinned(partition: &[u8]) -> Result<RsaKeypairPem, KeystoreError> {
    if partition.len() < PARTITION_MIN_LEN {
        return Err(KeystoreError::TooSmall {
            expected: PARTITION_MIN_LEN,
            actual: partition.len(),
        });
    }

    let private_cell = &partition[..RSA_PRIVKEY_PEM_LEN];
    let public_cell = &partition[PUBKEY_OFFSET..PUBKEY_OFFSET + RSA_PUBKEY_PEM_LEN];

    if !private_cell.starts_with(PEM_BEGIN_PRIVATE_KEY.as_bytes()) {
        return Err(KeystoreError::BadPrivateKey);
    }

    if !public_cell.starts_with(PEM_BEGIN_PUBLIC_KEY.as_bytes()) {
        return Err(KeystoreError::BadPublicKey);
    }

    let private_pem = Zeroizing::new(cell_text(private_cell)?.to_owned());
    let public_pem = cell_text(public_cell)?.to_owned();

    Ok(RsaKeypairPem {
        private_pem,
        public_pem,
    })
}

/// The PEM text of a cell, trailing zero padding stripped.
fn cell_text(cell: &[u8]) -> Result<&str, KeystoreError> {
    let end = cell
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(cell.len());

    std::str::from_utf8(&cell[..end]).map_err(|_| KeystoreError::NotUtf8)
}
