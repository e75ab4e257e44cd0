//! RSA-1024 keypair handling and PKCS#1 v1.5 encrypt/decrypt.
//!
//! The keypair protects exactly one thing: the per-session AES key (plus the
//! leading bytes of the credential record) during the provisioning handshake.
//! Keys are ephemeral per boot unless the pinned keystore is in use.
//!
//! Key generation needs far more stack than the protocol tasks are sized for,
//! so it always runs on a dedicated blocking task and hands its result back to
//! the caller, never inline.

use ::rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use ::rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use ::rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use md5::{Digest, Md5};
use tokio::sync::OnceCell;
use zeroize::Zeroizing;

use crate::keystore;
use crate::{
    CHECKSUM_LEN, CryptoError, PEM_BEGIN_PUBLIC_KEY, PEM_END_PUBLIC_KEY, RSA_CIPHERTEXT_LEN,
    RSA_KEY_BITS, RSA_PLAINTEXT_MAX_LEN, RSA_PRIVKEY_PEM_LEN, RSA_PUBKEY_PEM_BODY_LEN,
    RSA_PUBKEY_PEM_LEN,
};

/// An RSA keypair serialized to PEM text.
///
/// The private half is PKCS#1 (`BEGIN RSA PRIVATE KEY`), the public half is
/// SPKI (`BEGIN PUBLIC KEY`); both fit their fixed wire cells
/// ([`RSA_PRIVKEY_PEM_LEN`] / [`RSA_PUBKEY_PEM_LEN`]).
pub struct RsaKeypairPem {
    /// Private key PEM, zeroized on drop
    pub private_pem: Zeroizing<String>,
    /// Public key PEM
    pub public_pem: String,
}

impl RsaKeypairPem {
    /// The public key PEM with header and footer lines stripped, as sent on
    /// the wire. Always exactly [`RSA_PUBKEY_PEM_BODY_LEN`] bytes for a
    /// 1024-bit key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Pem`] if the PEM does not have the expected
    /// shape (foreign key size or mangled serialization).
    pub fn public_body(&self) -> Result<[u8; RSA_PUBKEY_PEM_BODY_LEN], CryptoError> {
        pubkey_pem_body(&self.public_pem)
    }
}

/// Generate a fresh RSA-1024 keypair and serialize both halves to PEM.
///
/// This is the heavy, blocking primitive; callers inside an async context
/// should go through [`KeypairProvider`] instead, which runs it on a
/// dedicated blocking task.
///
/// # Errors
///
/// Returns [`CryptoError::KeyGeneration`] or [`CryptoError::Pem`] if key
/// computation or serialization fails, and [`CryptoError::PemTooLarge`] if a
/// serialized half exceeds its fixed cell.
pub fn generate_keypair() -> Result<RsaKeypairPem, CryptoError> {
    let mut rng = rand::rngs::OsRng;

    let private = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

    let private_pem = private
        .to_pkcs1_pem(LineEnding::LF)
        .map_err(|e| CryptoError::Pem(e.to_string()))?;

    let public_pem = private
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::Pem(e.to_string()))?;

    if private_pem.len() > RSA_PRIVKEY_PEM_LEN {
        return Err(CryptoError::PemTooLarge {
            max: RSA_PRIVKEY_PEM_LEN,
            actual: private_pem.len(),
        });
    }

    if public_pem.len() > RSA_PUBKEY_PEM_LEN {
        return Err(CryptoError::PemTooLarge {
            max: RSA_PUBKEY_PEM_LEN,
            actual: public_pem.len(),
        });
    }

    Ok(RsaKeypairPem {
        private_pem,
        public_pem,
    })
}

/// Where a device's keypair comes from.
enum KeySource {
    /// Generate once per boot, in RAM only
    Ephemeral,
    /// Load verbatim from a reserved partition image; never generate
    Pinned(Vec<u8>),
}

/// Lazily-initialized, per-boot RSA keypair.
///
/// The keypair is produced exactly once and is read-only afterwards; there is
/// no rotation. Generation runs on a dedicated blocking task (its own stack),
/// with the result handed back over the task's completion channel.
pub struct KeypairProvider {
    source: KeySource,
    cell: OnceCell<RsaKeypairPem>,
}

impl KeypairProvider {
    /// Keypair generated on first use and held in RAM for the process
    /// lifetime.
    pub fn ephemeral() -> Self {
        Self {
            source: KeySource::Ephemeral,
            cell: OnceCell::new(),
        }
    }

    /// Keypair pinned at provisioning time, loaded verbatim from the given
    /// partition image. Used when whitelist security binds devices to keys
    /// written at manufacture.
    pub fn pinned(partition: Vec<u8>) -> Self {
        Self {
            source: KeySource::Pinned(partition),
            cell: OnceCell::new(),
        }
    }

    /// Get the keypair, generating or loading it on first call.
    ///
    /// # Errors
    ///
    /// Generation errors for [`KeypairProvider::ephemeral`];
    /// [`CryptoError::Keystore`] for a bad pinned image. Pinned mode never
    /// falls back to generation.
    pub async fn keypair(&self) -> Result<&RsaKeypairPem, CryptoError> {
        self.cell
            .get_or_try_init(|| async {
                match &self.source {
                    KeySource::Ephemeral => {
                        tracing::info!("generating RSA keypair");
                        tokio::task::spawn_blocking(generate_keypair)
                            .await
                            .map_err(|e| CryptoError::TaskFailed(e.to_string()))?
                    }
                    KeySource::Pinned(partition) => {
                        tracing::debug!("loading pinned RSA keypair");
                        Ok(keystore::load_pinned(partition)?)
                    }
                }
            })
            .await
    }
}

/// Strip the header and footer lines from a public-key PEM.
///
/// # Errors
///
/// Returns [`CryptoError::Pem`] if the text is not framed by the expected
/// lines or the body is not exactly [`RSA_PUBKEY_PEM_BODY_LEN`] bytes.
pub fn pubkey_pem_body(pem: &str) -> Result<[u8; RSA_PUBKEY_PEM_BODY_LEN], CryptoError> {
    let body = pem
        .strip_prefix(PEM_BEGIN_PUBLIC_KEY)
        .and_then(|rest| rest.strip_suffix(PEM_END_PUBLIC_KEY))
        .ok_or_else(|| CryptoError::Pem("public key PEM framing".into()))?;

    body.as_bytes()
        .try_into()
        .map_err(|_| CryptoError::Pem(format!("public key body is {} bytes", body.len())))
}

/// Rebuild a full public-key PEM from a stripped wire body.
pub fn pubkey_pem_from_body(body: &[u8; RSA_PUBKEY_PEM_BODY_LEN]) -> Result<String, CryptoError> {
    let body = std::str::from_utf8(body)
        .map_err(|_| CryptoError::Pem("public key body is not UTF-8".into()))?;

    Ok(format!(
        "{PEM_BEGIN_PUBLIC_KEY}{body}{PEM_END_PUBLIC_KEY}"
    ))
}

/// MD5 checksum of a public-key PEM, computed over the fixed-size
/// [`RSA_PUBKEY_PEM_LEN`] cell with the text zero-padded to the cell size.
///
/// This is the value stored in whitelist entries to bind an address to a
/// cryptographic identity.
pub fn pubkey_checksum(pem: &str) -> [u8; CHECKSUM_LEN] {
    let mut cell = [0u8; RSA_PUBKEY_PEM_LEN];
    let len = pem.len().min(RSA_PUBKEY_PEM_LEN);
    cell[..len].copy_from_slice(&pem.as_bytes()[..len]);

    Md5::digest(cell).into()
}

/// PKCS#1 v1.5 encrypt under a peer's public key.
///
/// Output is always exactly [`RSA_CIPHERTEXT_LEN`] bytes.
///
/// # Errors
///
/// [`CryptoError::PlaintextTooLong`] past the padding ceiling,
/// [`CryptoError::Pem`] for an unparseable key, [`CryptoError::EncryptFailed`]
/// on the operation itself.
pub fn encrypt(plaintext: &[u8], pubkey_pem: &str) -> Result<Vec<u8>, CryptoError> {
    if plaintext.is_empty() {
        return Err(CryptoError::InvalidArgument("empty plaintext"));
    }

    if plaintext.len() > RSA_PLAINTEXT_MAX_LEN {
        return Err(CryptoError::PlaintextTooLong {
            max: RSA_PLAINTEXT_MAX_LEN,
            actual: plaintext.len(),
        });
    }

    let public = RsaPublicKey::from_public_key_pem(pubkey_pem)
        .map_err(|e| CryptoError::Pem(e.to_string()))?;

    public
        .encrypt(&mut rand::rngs::OsRng, Pkcs1v15Encrypt, plaintext)
        .map_err(|_| CryptoError::EncryptFailed)
}

/// PKCS#1 v1.5 decrypt under our private key.
///
/// # Errors
///
/// [`CryptoError::CiphertextLength`] unless the input is exactly one modulus,
/// [`CryptoError::Pem`] for an unparseable key, [`CryptoError::DecryptFailed`]
/// on padding or key mismatch. A decrypt failure is a cryptographic error,
/// distinct from the malformed-input case callers filter on length first.
pub fn decrypt(ciphertext: &[u8], privkey_pem: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if ciphertext.len() != RSA_CIPHERTEXT_LEN {
        return Err(CryptoError::CiphertextLength {
            expected: RSA_CIPHERTEXT_LEN,
            actual: ciphertext.len(),
        });
    }

    let private = RsaPrivateKey::from_pkcs1_pem(privkey_pem)
        .map_err(|e| CryptoError::Pem(e.to_string()))?;

    private
        .decrypt(Pkcs1v15Encrypt, ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::DecryptFailed)
}
