//! Account record

use bach_crypto::keccak256;
use bach_primitives::{H256, U256};
use bytes::Bytes;
use std::collections::BTreeMap;

/// keccak256 of empty bytes
pub const EMPTY_CODE_HASH: H256 = H256::from_bytes([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c,
    0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b,
    0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
]);

/// Account state.
///
/// Storage never holds zero values: writing zero removes the key, so an
/// absent key and a zero slot are indistinguishable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    /// Balance in wei
    pub balance: U256,
    /// Nonce
    pub nonce: u64,
    /// Code
    pub code: Bytes,
    /// Non-zero storage slots
    storage: BTreeMap<U256, U256>,
}

impl Account {
    /// Account holding `balance` and nothing else
    pub fn with_balance(balance: U256) -> Self {
        Account {
            balance,
            ..Default::default()
        }
    }

    /// Contract account
    pub fn with_code(code: impl Into<Bytes>, balance: U256, nonce: u64) -> Self {
        Account {
            balance,
            nonce,
            code: code.into(),
            storage: BTreeMap::new(),
        }
    }

    /// No code, zero nonce and zero balance (EIP-161)
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code.is_empty()
    }

    /// Check if account has code
    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }

    /// keccak256 of the code
    pub fn code_hash(&self) -> H256 {
        if self.code.is_empty() {
            EMPTY_CODE_HASH
        } else {
            keccak256(&self.code)
        }
    }

    /// Read a slot, zero when absent
    pub fn storage_get(&self, key: &U256) -> U256 {
        self.storage.get(key).copied().unwrap_or_default()
    }

    /// Write a slot, returning the previous value
    pub fn storage_set(&mut self, key: U256, value: U256) -> U256 {
        let previous = if value.is_zero() {
            self.storage.remove(&key)
        } else {
            self.storage.insert(key, value)
        };
        previous.unwrap_or_default()
    }

    /// Non-zero slots in key order
    pub fn storage(&self) -> &BTreeMap<U256, U256> {
        &self.storage
    }

    /// Builder-style storage initialisation
    pub fn with_storage(mut self, slots: impl IntoIterator<Item = (U256, U256)>) -> Self {
        for (key, value) in slots {
            self.storage_set(key, value);
        }
        self
    }

    /// Drop all storage
    pub fn clear_storage(&mut self) {
        self.storage.clear();
    }
}
