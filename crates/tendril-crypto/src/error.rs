//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors.
///
/// None of these are retryable: a handshake attempt that hits a cryptographic
/// failure must be abandoned, not repeated with the same inputs.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid argument (null-equivalent or zero-length input)
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// OS entropy source failed
    #[error("random number generation failed")]
    RandomFailed,

    /// RSA keypair generation failed
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// PEM encode/decode failure
    #[error("PEM error: {0}")]
    Pem(String),

    /// Serialized PEM exceeds its fixed wire cell
    #[error("PEM too large: {actual} bytes, cell is {max}")]
    PemTooLarge {
        /// Fixed cell size
        max: usize,
        /// Serialized size
        actual: usize,
    },

    /// Plaintext exceeds the PKCS#1 v1.5 ceiling
    #[error("plaintext too long: {actual} bytes, maximum {max}")]
    PlaintextTooLong {
        /// Maximum plaintext size for the key
        max: usize,
        /// Actual plaintext size
        actual: usize,
    },

    /// Ciphertext is not exactly one modulus in length
    #[error("ciphertext length {actual}, expected {expected}")]
    CiphertextLength {
        /// Expected length (modulus size)
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// RSA encryption failed
    #[error("encryption failed")]
    EncryptFailed,

    /// RSA decryption failed (padding or key mismatch)
    #[error("decryption failed")]
    DecryptFailed,

    /// DH domain parameters could not be parsed or are degenerate
    #[error("invalid DH parameters: {0}")]
    DhParams(&'static str),

    /// Pinned keystore failure
    #[error("keystore error: {0}")]
    Keystore(#[from] KeystoreError),

    /// Keypair helper task died before reporting a result
    #[error("key generation task failed: {0}")]
    TaskFailed(String),
}

/// Errors loading a pinned keypair from a partition image.
///
/// All of these are fatal configuration errors: pinned mode never falls back
/// to generation.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// Partition image smaller than the two fixed key cells
    #[error("partition too small: {actual} bytes, need {expected}")]
    TooSmall {
        /// Required size
        expected: usize,
        /// Image size
        actual: usize,
    },

    /// Private-key cell does not start with the expected PEM header
    #[error("private key cell is not a PEM private key")]
    BadPrivateKey,

    /// Public-key cell does not start with the expected PEM header
    #[error("public key cell is not a PEM public key")]
    BadPublicKey,

    /// Key cell is not valid UTF-8
    #[error("key cell is not valid UTF-8")]
    NotUtf8,
}
