//! Block-scoped execution environment

use bach_crypto::keccak256;
use bach_primitives::{Address, H256, U256};

/// Default fee recipient used by scenarios that do not pick one
pub const DEFAULT_COINBASE: Address = Address::from_bytes([
    0x2a, 0xdc, 0x25, 0x66, 0x50, 0x18, 0xaa, 0x1f, 0xe0, 0xe6,
    0xbc, 0x66, 0x6d, 0xac, 0x8f, 0xc2, 0x69, 0x7f, 0xf9, 0xba,
]);

/// Read-only block context visible to environment opcodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Environment {
    /// Fee recipient
    pub coinbase: Address,
    /// Difficulty (pre-Paris)
    pub difficulty: U256,
    /// Randomness beacon output (Paris onward)
    pub prevrandao: H256,
    /// Block gas limit
    pub gas_limit: u64,
    /// Block number
    pub number: u64,
    /// Block timestamp
    pub timestamp: u64,
    /// Base fee per gas (London onward)
    pub base_fee: U256,
    /// Blob base fee (Cancun onward)
    pub blob_base_fee: U256,
    /// Chain id returned by CHAINID
    pub chain_id: u64,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            coinbase: DEFAULT_COINBASE,
            difficulty: U256::from(0x20000u64),
            prevrandao: H256::ZERO,
            gas_limit: 100_000_000_000_000_000,
            number: 1,
            timestamp: 1000,
            base_fee: U256::from(7u64),
            blob_base_fee: U256::one(),
            chain_id: 1,
        }
    }
}

impl Environment {
    /// Default environment on `chain_id`
    pub fn with_chain_id(chain_id: u64) -> Self {
        Environment {
            chain_id,
            ..Default::default()
        }
    }

    /// Hash of an ancestor block.
    ///
    /// There is no chain behind the single block context, so ancestors are
    /// given the synthetic hash keccak256(decimal block number).
    pub fn block_hash(&self, number: u64) -> H256 {
        keccak256(number.to_string().as_bytes())
    }
}
