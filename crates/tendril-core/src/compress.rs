//! Whitelist compression adapter.
//!
//! The whitelist is the only variable-size piece of the handshake and the
//! only one that can outgrow a radio message, so it is deflated (zlib
//! container) before the transfer and inflated after. Nothing else about the
//! protocol is compressed.

use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::decompress_to_vec_zlib_with_limit;
use tendril_radio::MAX_MESSAGE_LEN;

use crate::error::CompressError;

/// Deflate level; matches the zlib default the peer side expects to cope with
const COMPRESSION_LEVEL: u8 = 6;

/// Compress whitelist bytes for transfer.
///
/// # Errors
///
/// [`CompressError::TooLarge`] if even the compressed form exceeds the
/// transport message ceiling.
pub fn compress(raw: &[u8]) -> Result<Vec<u8>, CompressError> {
    let blob = compress_to_vec_zlib(raw, COMPRESSION_LEVEL);

    if blob.len() > MAX_MESSAGE_LEN {
        return Err(CompressError::TooLarge {
            len: blob.len(),
            max: MAX_MESSAGE_LEN,
        });
    }

    Ok(blob)
}

/// Decompress a received whitelist blob.
///
/// `expected_max` is the byte count the credential header declared; a blob
/// inflating past it is corrupt or hostile and is rejected.
///
/// # Errors
///
/// [`CompressError::Inflate`] on corrupt input or an over-bound result.
pub fn decompress(blob: &[u8], expected_max: usize) -> Result<Vec<u8>, CompressError> {
    decompress_to_vec_zlib_with_limit(blob, expected_max)
        .map_err(|e| CompressError::Inflate(format!("{e:?}")))
}
