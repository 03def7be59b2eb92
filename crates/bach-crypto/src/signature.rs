//! secp256k1 signing and recovery

use crate::{keccak256, CryptoError};
use bach_primitives::{Address, H256};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};

/// Public key
pub type PublicKey = VerifyingKey;

/// Private key (32 bytes)
pub type PrivateKey = SigningKey;

/// Half of the secp256k1 group order, the upper bound for low-s signatures.
const SECP256K1_N_DIV_2: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D,
    0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Recoverable ECDSA signature.
///
/// `y_parity` is the raw recovery id (0 or 1); transaction encodings derive
/// their own `v` from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    /// r component
    pub r: [u8; 32],
    /// s component
    pub s: [u8; 32],
    /// Recovery id
    pub y_parity: u8,
}

impl Signature {
    /// Create signature from components
    pub fn new(r: [u8; 32], s: [u8; 32], y_parity: u8) -> Self {
        Signature { r, s, y_parity }
    }

    /// Build from a pre-EIP-155 `v` of 27 or 28.
    pub fn from_legacy_v(r: [u8; 32], s: [u8; 32], v: u64) -> Result<Self, CryptoError> {
        match v {
            27 | 28 => Ok(Signature::new(r, s, (v - 27) as u8)),
            other => Err(CryptoError::InvalidRecoveryId(other)),
        }
    }

    /// Check if signature has low-s value (EIP-2)
    pub fn is_low_s(&self) -> bool {
        self.s <= SECP256K1_N_DIV_2
    }
}

/// Load a private key from its 32-byte big-endian scalar.
pub fn private_key_from_bytes(bytes: &[u8]) -> Result<PrivateKey, CryptoError> {
    SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)
}

/// Load a private key from hex (with or without 0x prefix).
pub fn private_key_from_hex(s: &str) -> Result<PrivateKey, CryptoError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|_| CryptoError::InvalidPrivateKey)?;
    private_key_from_bytes(&bytes)
}

/// Sign a 32-byte prehash, normalizing to low-s.
pub fn sign(message_hash: &H256, private_key: &PrivateKey) -> Result<Signature, CryptoError> {
    let (signature, recovery_id) = private_key
        .sign_prehash_recoverable(message_hash.as_bytes())
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    let (signature, recovery_id) = match signature.normalize_s() {
        Some(normalized) => {
            let flipped = RecoveryId::from_byte(recovery_id.to_byte() ^ 1)
                .ok_or(CryptoError::InvalidRecoveryId(u64::from(recovery_id.to_byte() ^ 1)))?;
            (normalized, flipped)
        }
        None => (signature, recovery_id),
    };

    Ok(Signature {
        r: signature.r().to_bytes().into(),
        s: signature.s().to_bytes().into(),
        y_parity: recovery_id.to_byte(),
    })
}

/// Recover the signer's public key.
pub fn recover_public_key(
    message_hash: &H256,
    signature: &Signature,
) -> Result<PublicKey, CryptoError> {
    let r: k256::FieldBytes = signature.r.into();
    let s: k256::FieldBytes = signature.s.into();
    let k256_sig = K256Signature::from_scalars(r, s)
        .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

    let recovery_id = RecoveryId::from_byte(signature.y_parity)
        .ok_or(CryptoError::InvalidRecoveryId(u64::from(signature.y_parity)))?;

    VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &k256_sig, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}

/// Recover the signer's address.
pub fn recover_address(message_hash: &H256, signature: &Signature) -> Result<Address, CryptoError> {
    recover_public_key(message_hash, signature).map(|key| public_key_to_address(&key))
}

/// Derive address from public key: last 20 bytes of keccak256(x || y).
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let encoded = public_key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);

    let mut addr_bytes = [0u8; 20];
    addr_bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(addr_bytes)
}

/// Address controlled by a private key.
pub fn private_key_to_address(private_key: &PrivateKey) -> Address {
    public_key_to_address(private_key.verifying_key())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0x45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8";

    #[test]
    fn test_known_key_address() {
        let key = private_key_from_hex(TEST_KEY).unwrap();
        assert_eq!(
            private_key_to_address(&key).to_hex(),
            "0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b"
        );
    }

    #[test]
    fn test_sign_and_recover() {
        let key = private_key_from_hex(TEST_KEY).unwrap();
        let hash = keccak256(b"state transition");

        let signature = sign(&hash, &key).unwrap();
        assert!(signature.is_low_s());
        assert!(signature.y_parity <= 1);

        let recovered = recover_address(&hash, &signature).unwrap();
        assert_eq!(recovered, private_key_to_address(&key));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let key = private_key_from_hex(TEST_KEY).unwrap();
        let hash = keccak256(b"rfc6979");
        assert_eq!(sign(&hash, &key).unwrap(), sign(&hash, &key).unwrap());
    }

    #[test]
    fn test_recover_with_wrong_parity_gives_other_address() {
        let key = private_key_from_hex(TEST_KEY).unwrap();
        let hash = keccak256(b"parity");
        let mut signature = sign(&hash, &key).unwrap();
        signature.y_parity ^= 1;

        match recover_address(&hash, &signature) {
            Ok(addr) => assert_ne!(addr, private_key_to_address(&key)),
            Err(CryptoError::RecoveryFailed(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(matches!(
            private_key_from_bytes(&[0u8; 32]),
            Err(CryptoError::InvalidPrivateKey)
        ));
        assert!(matches!(
            private_key_from_hex("0x1234"),
            Err(CryptoError::InvalidPrivateKey)
        ));
    }

    #[test]
    fn test_legacy_v() {
        assert_eq!(Signature::from_legacy_v([1; 32], [2; 32], 28).unwrap().y_parity, 1);
        assert!(matches!(
            Signature::from_legacy_v([1; 32], [2; 32], 29),
            Err(CryptoError::InvalidRecoveryId(29))
        ));
    }
}
