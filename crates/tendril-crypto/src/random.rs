//! Secure random number generation.
//!
//! All randomness comes from the operating system CSPRNG (hardware entropy on
//! embedded targets).

use crate::{AES_KEY_LEN, CryptoError};

/// Fill a buffer with random bytes.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidArgument`] for an empty buffer and
/// [`CryptoError::RandomFailed`] if the entropy source fails.
pub fn secure_random(buf: &mut [u8]) -> Result<(), CryptoError> {
    if buf.is_empty() {
        return Err(CryptoError::InvalidArgument("empty random buffer"));
    }

    getrandom::getrandom(buf).map_err(|_| CryptoError::RandomFailed)
}

/// Generate a random AES session key.
///
/// # Errors
///
/// Returns [`CryptoError::RandomFailed`] if the entropy source fails.
pub fn random_aes_key() -> Result<[u8; AES_KEY_LEN], CryptoError> {
    let mut key = [0u8; AES_KEY_LEN];
    secure_random(&mut key)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_buffer() {
        let mut buf = [];
        assert!(matches!(
            secure_random(&mut buf),
            Err(CryptoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn fills_buffer() {
        let mut buf = [0u8; 64];
        secure_random(&mut buf).unwrap();
        // 64 zero bytes from a working CSPRNG is a 2^-512 event
        assert_ne!(buf, [0u8; 64]);
    }

    #[test]
    fn session_keys_differ() {
        let a = random_aes_key().unwrap();
        let b = random_aes_key().unwrap();
        assert_ne!(a, b);
    }
}
