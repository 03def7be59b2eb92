//! # bach-crypto
//!
//! Cryptographic primitives for the state-test harness.
//!
//! - Keccak-256, SHA-256 and RIPEMD-160 hashing
//! - ECDSA signing and public key recovery (secp256k1)
//! - Address derivation

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod signature;

pub use error::CryptoError;
pub use hash::{keccak256, ripemd160, sha256};
pub use signature::{
    private_key_from_bytes, private_key_from_hex, private_key_to_address, public_key_to_address,
    recover_address, recover_public_key, sign, PrivateKey, PublicKey, Signature,
};
