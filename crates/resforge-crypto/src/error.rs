//! Error types for cryptographic operations

use thiserror::Error;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Input is too short to contain the envelope
    #[error("Encrypted data too short: expected at least {minimum} bytes, got {actual}")]
    TooShort {
        /// Minimum envelope size in bytes
        minimum: usize,
        /// Actual input size in bytes
        actual: usize,
    },

    /// Ciphertext is not a whole number of AES blocks
    #[error("Ciphertext length {0} is not a multiple of 16")]
    UnalignedCiphertext(usize),

    /// Stored HMAC does not match the recomputed one
    #[error("HMAC mismatch for {path}")]
    HmacMismatch {
        /// Internal path used for key derivation
        path: String,
    },

    /// Invalid key or IV length handed to the cipher
    #[error("Invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize {
        /// Expected key size in bytes
        expected: usize,
        /// Actual key size in bytes
        actual: usize,
    },

    /// Block cipher padding was malformed after decryption
    #[error("Invalid padding after decryption")]
    InvalidPadding,

    /// The system random source failed
    #[error("Random source unavailable: {0}")]
    Random(String),
}

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;
