//! Transaction errors

use bach_crypto::CryptoError;
use thiserror::Error;

/// Errors while signing or authenticating a transaction
#[derive(Debug, Error)]
pub enum TxError {
    /// Signing or recovery failed
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// `v` does not encode a recovery parity for this transaction
    #[error("invalid signature v value: {0}")]
    InvalidV(u64),

    /// r or s is zero
    #[error("signature has zero r or s")]
    EmptySignature,
}
