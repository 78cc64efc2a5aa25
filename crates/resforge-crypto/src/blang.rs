//! Encrypted envelope around blang string tables
//!
//! Layout of an encrypted blang chunk:
//!
//! ```text
//! [12 bytes salt][16 bytes IV][ciphertext][32 bytes HMAC-SHA256]
//! ```
//!
//! The key is `SHA-256(salt || "swapTeam\n\0" || internal_path)`. The first
//! 16 bytes of the digest are the AES-128-CBC key; the full 32-byte digest
//! keys the HMAC, which covers salt, IV and ciphertext in that order.

use crate::error::{CryptoError, Result};
use aes::Aes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// Size of the random salt prefix
pub const SALT_SIZE: usize = 12;

/// Size of the AES-CBC initialization vector
pub const IV_SIZE: usize = 16;

/// Size of the trailing HMAC-SHA256 tag
pub const HMAC_SIZE: usize = 32;

/// Smallest possible envelope: salt, IV, one cipher block and the tag
pub const MIN_ENVELOPE_SIZE: usize = SALT_SIZE + IV_SIZE + 16 + HMAC_SIZE;

/// Static key-derivation string, including its terminator
const KEY_DERIVE_STATIC: &[u8; 10] = b"swapTeam\n\0";

const AES_BLOCK_SIZE: usize = 16;

/// Derive the 32-byte envelope key for a salt and internal path
pub fn derive_key(salt: &[u8], internal_path: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(KEY_DERIVE_STATIC);
    hasher.update(internal_path.as_bytes());
    let digest = hasher.finalize();

    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

fn mac_for(key: &[u8; 32], salt: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| CryptoError::InvalidKeySize {
        expected: 32,
        actual: key.len(),
    })?;
    mac.update(salt);
    mac.update(iv);
    mac.update(ciphertext);
    Ok(mac)
}

/// Decrypt and authenticate a blang envelope
///
/// # Arguments
/// * `data` - The complete envelope as stored in the container
/// * `internal_path` - The chunk's name inside the container
///   (e.g. `strings/english.blang`)
///
/// # Errors
///
/// Fails when the envelope is truncated, the HMAC does not verify, or the
/// plaintext padding is malformed.
pub fn decrypt(data: &[u8], internal_path: &str) -> Result<Vec<u8>> {
    if data.len() < MIN_ENVELOPE_SIZE {
        return Err(CryptoError::TooShort {
            minimum: MIN_ENVELOPE_SIZE,
            actual: data.len(),
        });
    }

    let salt = &data[..SALT_SIZE];
    let iv = &data[SALT_SIZE..SALT_SIZE + IV_SIZE];
    let ciphertext = &data[SALT_SIZE + IV_SIZE..data.len() - HMAC_SIZE];
    let stored_mac = &data[data.len() - HMAC_SIZE..];

    if ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(CryptoError::UnalignedCiphertext(ciphertext.len()));
    }

    let key = derive_key(salt, internal_path);

    // Authenticate before touching the ciphertext
    mac_for(&key, salt, iv, ciphertext)?
        .verify_slice(stored_mac)
        .map_err(|_| CryptoError::HmacMismatch {
            path: internal_path.to_string(),
        })?;

    let cipher = Aes128CbcDec::new_from_slices(&key[..16], iv).map_err(|_| {
        CryptoError::InvalidKeySize {
            expected: 16,
            actual: iv.len(),
        }
    })?;

    let mut buffer = ciphertext.to_vec();
    let plaintext_len = cipher
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| CryptoError::InvalidPadding)?
        .len();
    buffer.truncate(plaintext_len);

    Ok(buffer)
}

/// Encrypt a plaintext string table with a fresh random salt and IV
pub fn encrypt(plaintext: &[u8], internal_path: &str) -> Result<Vec<u8>> {
    let mut salt = [0u8; SALT_SIZE];
    let mut iv = [0u8; IV_SIZE];
    getrandom::fill(&mut salt).map_err(|e| CryptoError::Random(e.to_string()))?;
    getrandom::fill(&mut iv).map_err(|e| CryptoError::Random(e.to_string()))?;

    encrypt_with(plaintext, internal_path, &salt, &iv)
}

/// Encrypt a plaintext string table with a caller-supplied salt and IV
///
/// Output is `salt || iv || ciphertext || hmac`.
pub fn encrypt_with(
    plaintext: &[u8],
    internal_path: &str,
    salt: &[u8; SALT_SIZE],
    iv: &[u8; IV_SIZE],
) -> Result<Vec<u8>> {
    let key = derive_key(salt, internal_path);

    let cipher = Aes128CbcEnc::new_from_slices(&key[..16], iv).map_err(|_| {
        CryptoError::InvalidKeySize {
            expected: 16,
            actual: key.len(),
        }
    })?;

    // PKCS#7 always adds between 1 and 16 bytes
    let padded_len = (plaintext.len() / AES_BLOCK_SIZE + 1) * AES_BLOCK_SIZE;
    let mut buffer = vec![0u8; padded_len];
    buffer[..plaintext.len()].copy_from_slice(plaintext);
    let ciphertext_len = cipher
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, plaintext.len())
        .map_err(|_| CryptoError::InvalidPadding)?
        .len();
    buffer.truncate(ciphertext_len);

    let tag = mac_for(&key, salt, iv, &buffer)?.finalize().into_bytes();

    let mut output = Vec::with_capacity(SALT_SIZE + IV_SIZE + buffer.len() + HMAC_SIZE);
    output.extend_from_slice(salt);
    output.extend_from_slice(iv);
    output.extend_from_slice(&buffer);
    output.extend_from_slice(&tag);
    Ok(output)
}
