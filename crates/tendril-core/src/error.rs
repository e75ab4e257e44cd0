//! Error types for the TENDRIL core protocol.
//!
//! The protocol's failure taxonomy:
//!
//! - transport errors are retried only where a retry budget exists (whitelist
//!   transfer), otherwise the current attempt fails and the outer loop resumes
//! - cryptographic errors are never retried; the attempt is abandoned
//! - malformed frames (wrong size) are discarded without error propagation,
//!   since unrelated traffic shares the channel
//! - resource exhaustion is typed and propagated, never fatal

use thiserror::Error;

/// Core protocol errors
#[derive(Debug, Error)]
pub enum Error {
    /// Cryptographic failure (never retried)
    #[error("crypto error: {0}")]
    Crypto(#[from] tendril_crypto::CryptoError),

    /// Radio transport failure
    #[error("radio error: {0}")]
    Radio(#[from] tendril_radio::RadioError),

    /// Wire-format violation
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Whitelist compression failure
    #[error("compression error: {0}")]
    Compress(#[from] CompressError),

    /// Caller-supplied argument rejected
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A protocol task died without reporting a result
    #[error("task failed: {0}")]
    Task(String),
}

/// Wire-format errors
#[derive(Debug, Error)]
pub enum WireError {
    /// Message is not the exact expected size
    #[error("unexpected length: {actual}, expected {expected}")]
    UnexpectedLength {
        /// Expected exact size
        expected: usize,
        /// Received size
        actual: usize,
    },

    /// Unknown payload tag byte
    #[error("invalid payload tag: 0x{0:02X}")]
    InvalidPayloadTag(u8),

    /// Unknown mesh role byte
    #[error("invalid mesh role: 0x{0:02X}")]
    InvalidRole(u8),

    /// Whitelist bytes are not a whole number of entries
    #[error("whitelist size {0} is not a multiple of the entry size")]
    WhitelistAlignment(usize),
}

/// Whitelist compression errors
#[derive(Debug, Error)]
pub enum CompressError {
    /// Compressed blob would not fit the transport ceiling
    #[error("compressed whitelist is {len} bytes, transport ceiling {max}")]
    TooLarge {
        /// Compressed size
        len: usize,
        /// Transport ceiling
        max: usize,
    },

    /// Inflate failed (corrupt blob or over the expected bound)
    #[error("decompression failed: {0}")]
    Inflate(String),
}

/// Configuration-queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// No configuration arrived within the wait
    #[error("queue read timed out")]
    Timeout,
}
