//! Precompiled contracts 0x01-0x04

use crate::error::{EvmError, EvmResult};
use crate::gas::words;
use bach_crypto::{recover_address, ripemd160, sha256, Signature};
use bach_primitives::{Address, H256};
use bytes::Bytes;

/// Precompiles available from Frontier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Precompile {
    /// 0x01
    EcRecover,
    /// 0x02
    Sha256,
    /// 0x03
    Ripemd160,
    /// 0x04
    Identity,
}

/// Successful precompile run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecompileOutput {
    /// Gas charged
    pub gas_used: u64,
    /// Return data
    pub output: Bytes,
}

impl Precompile {
    /// Every precompile in address order
    pub const ALL: [Precompile; 4] = [
        Precompile::EcRecover,
        Precompile::Sha256,
        Precompile::Ripemd160,
        Precompile::Identity,
    ];

    /// Precompile living at `address`
    pub fn at(address: &Address) -> Option<Self> {
        let bytes = address.as_bytes();
        if bytes[..19].iter().any(|&b| b != 0) {
            return None;
        }
        match bytes[19] {
            1 => Some(Precompile::EcRecover),
            2 => Some(Precompile::Sha256),
            3 => Some(Precompile::Ripemd160),
            4 => Some(Precompile::Identity),
            _ => None,
        }
    }

    /// Address of this precompile
    pub fn address(self) -> Address {
        let n = match self {
            Precompile::EcRecover => 1,
            Precompile::Sha256 => 2,
            Precompile::Ripemd160 => 3,
            Precompile::Identity => 4,
        };
        Address::from_low_u64_be(n)
    }

    /// Gas for an input of `len` bytes
    pub fn cost(self, len: usize) -> u64 {
        let words = words(len);
        match self {
            Precompile::EcRecover => 3000,
            Precompile::Sha256 => 60 + 12 * words,
            Precompile::Ripemd160 => 600 + 120 * words,
            Precompile::Identity => 15 + 3 * words,
        }
    }

    /// Charge and execute
    pub fn run(self, input: &[u8], gas_limit: u64) -> EvmResult<PrecompileOutput> {
        let gas_used = self.cost(input.len());
        if gas_used > gas_limit {
            return Err(EvmError::OutOfGas);
        }
        let output = match self {
            Precompile::EcRecover => ecrecover(input),
            Precompile::Sha256 => Bytes::copy_from_slice(&sha256(input)),
            Precompile::Ripemd160 => {
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(&ripemd160(input));
                Bytes::copy_from_slice(&word)
            }
            Precompile::Identity => Bytes::copy_from_slice(input),
        };
        Ok(PrecompileOutput { gas_used, output })
    }
}

// Invalid signatures return empty output rather than failing the call
fn ecrecover(input: &[u8]) -> Bytes {
    let mut padded = [0u8; 128];
    let len = input.len().min(128);
    padded[..len].copy_from_slice(&input[..len]);

    let v_word = &padded[32..64];
    if v_word[..31].iter().any(|&b| b != 0) {
        return Bytes::new();
    }
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&padded[64..96]);
    s.copy_from_slice(&padded[96..128]);
    let signature = match Signature::from_legacy_v(r, s, u64::from(v_word[31])) {
        Ok(signature) => signature,
        Err(_) => return Bytes::new(),
    };

    let mut hash = [0u8; 32];
    hash.copy_from_slice(&padded[..32]);
    match recover_address(&H256::from(hash), &signature) {
        Ok(address) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(address.as_bytes());
            Bytes::copy_from_slice(&word)
        }
        Err(_) => Bytes::new(),
    }
}
