//! AES-128-CFB128 bulk cipher.
//!
//! CFB needs no padding, so ciphertext length equals plaintext length — the
//! wire layout depends on that.

use aes::Aes128;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use cfb_mode::{Decryptor, Encryptor};

use crate::AES_KEY_LEN;

/// The protocol-constant CFB initialization vector.
///
/// Every session and both messages within a session (credential record and
/// whitelist) reuse this IV. IV reuse with a stream-style mode is a known
/// cryptographic weakness inherited from the wire protocol; it is kept
/// bit-for-bit for interoperability. See DESIGN.md before "fixing" it.
pub const AES_CFB_IV: [u8; AES_KEY_LEN] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
    0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
];

/// Encrypt in place with the protocol IV.
pub fn cfb_encrypt(key: &[u8; AES_KEY_LEN], data: &mut [u8]) {
    Encryptor::<Aes128>::new(key.into(), (&AES_CFB_IV).into()).encrypt(data);
}

/// Decrypt in place with the protocol IV.
pub fn cfb_decrypt(key: &[u8; AES_KEY_LEN], data: &mut [u8]) {
    Decryptor::<Aes128>::new(key.into(), (&AES_CFB_IV).into()).decrypt(data);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trip() {
        let key = [0x42u8; AES_KEY_LEN];
        let plaintext = b"mesh credentials in flight".to_vec();

        let mut data = plaintext.clone();
        cfb_encrypt(&key, &mut data);
        assert_ne!(data, plaintext);
        assert_eq!(data.len(), plaintext.len());

        cfb_decrypt(&key, &mut data);
        assert_eq!(data, plaintext);
    }

    #[test]
    fn wrong_key_garbles() {
        let mut data = b"mesh credentials in flight".to_vec();
        cfb_encrypt(&[0x42u8; AES_KEY_LEN], &mut data);
        cfb_decrypt(&[0x43u8; AES_KEY_LEN], &mut data);
        assert_ne!(&data[..], b"mesh credentials in flight");
    }

    proptest! {
        #[test]
        fn round_trip_any_payload(key in prop::array::uniform16(any::<u8>()),
                                  plaintext in prop::collection::vec(any::<u8>(), 1..512)) {
            let mut data = plaintext.clone();
            cfb_encrypt(&key, &mut data);
            cfb_decrypt(&key, &mut data);
            prop_assert_eq!(data, plaintext);
        }
    }
}
