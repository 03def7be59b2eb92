//! Pre-state allocation
//!
//! Addresses come from monotonically increasing counters rather than
//! CREATE derivation, so two scenarios built the same way get the same
//! addresses.

use crate::error::{SetupError, SetupResult};
use bach_crypto::{private_key_from_bytes, private_key_to_address, PrivateKey};
use bach_primitives::{Address, U256};
use bach_types::{Account, WorldState};
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// First contract address handed out
pub const CONTRACT_START: u64 = 0x1000;

/// Distance between consecutive contract addresses
pub const CONTRACT_STEP: u64 = 0x100;

/// First EOA private key; later keys increment from it
pub const EOA_START_KEY: [u8; 32] = [
    0x45, 0xa9, 0x15, 0xe4, 0xd0, 0x60, 0x14, 0x9e, 0xb4, 0x36, 0x59, 0x60, 0xe6, 0xa7, 0xa4, 0x5f,
    0x33, 0x43, 0x93, 0x09, 0x30, 0x61, 0x16, 0xb1, 0x97, 0xe3, 0x24, 0x00, 0x65, 0xff, 0x2d, 0xd8,
];

/// Externally-owned account with its signing key
#[derive(Clone)]
pub struct Eoa {
    /// Account address
    pub address: Address,
    /// Signing key
    pub private_key: PrivateKey,
}

impl std::fmt::Debug for Eoa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Eoa")
            .field("address", &self.address.to_hex())
            .finish()
    }
}

/// Contract to place in the pre-state
#[derive(Clone, Debug, Default)]
pub struct Deployment {
    /// Runtime code
    pub code: Bytes,
    /// Initial balance
    pub balance: U256,
    /// Initial nonce
    pub nonce: u64,
    /// Initial storage
    pub storage: BTreeMap<U256, U256>,
}

impl Deployment {
    /// Contract with `code`, zero balance and nonce
    pub fn new(code: impl Into<Bytes>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    /// Set the balance
    pub fn balance(mut self, balance: U256) -> Self {
        self.balance = balance;
        self
    }

    /// Set the nonce
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Set one storage slot
    pub fn storage(mut self, key: U256, value: U256) -> Self {
        self.storage.insert(key, value);
        self
    }
}

/// Builds the pre-execution world state of one scenario
#[derive(Debug)]
pub struct AccountAllocator {
    state: WorldState,
    next_contract: u64,
    next_key: U256,
    keys: HashMap<Address, PrivateKey>,
}

impl Default for AccountAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountAllocator {
    /// Empty allocator
    pub fn new() -> Self {
        Self {
            state: WorldState::new(),
            next_contract: CONTRACT_START,
            next_key: U256::from_big_endian(&EOA_START_KEY),
            keys: HashMap::new(),
        }
    }

    /// Place a contract with `code`, `balance` and `nonce` at a fresh address
    pub fn deploy_contract(
        &mut self,
        code: impl Into<Bytes>,
        balance: U256,
        nonce: u64,
    ) -> SetupResult<Address> {
        self.deploy(Deployment::new(code).balance(balance).nonce(nonce))
    }

    /// Place a contract described by `deployment` at a fresh address
    pub fn deploy(&mut self, deployment: Deployment) -> SetupResult<Address> {
        let address = Address::from_low_u64_be(self.next_contract);
        self.next_contract += CONTRACT_STEP;
        let account = Account::with_code(deployment.code, deployment.balance, deployment.nonce)
            .with_storage(deployment.storage);
        self.insert_account(address, account)?;
        trace!(address = %address, "deployed contract");
        Ok(address)
    }

    /// Fund a fresh externally-owned account with `amount`
    pub fn fund_eoa(&mut self, amount: U256) -> SetupResult<Eoa> {
        let mut key_bytes = [0u8; 32];
        self.next_key.to_big_endian(&mut key_bytes);
        self.next_key = self.next_key.overflowing_add(U256::one()).0;
        let private_key = private_key_from_bytes(&key_bytes)?;
        self.fund_eoa_with_key(private_key, amount)
    }

    /// Fund the account controlled by `private_key`
    pub fn fund_eoa_with_key(&mut self, private_key: PrivateKey, amount: U256) -> SetupResult<Eoa> {
        let address = private_key_to_address(&private_key);
        self.insert_account(address, Account::with_balance(amount))?;
        self.keys.insert(address, private_key.clone());
        trace!(address = %address, balance = %amount, "funded eoa");
        Ok(Eoa {
            address,
            private_key,
        })
    }

    /// Place `account` at a caller-chosen address
    pub fn insert_account(&mut self, address: Address, account: Account) -> SetupResult<()> {
        if self.state.contains(&address) {
            return Err(SetupError::AddressCollision(address));
        }
        self.state.insert(address, account);
        Ok(())
    }

    /// Signing key of an EOA funded through this allocator
    pub fn key_for(&self, address: &Address) -> Option<&PrivateKey> {
        self.keys.get(address)
    }

    /// Pre-state built so far
    pub fn pre_state(&self) -> &WorldState {
        &self.state
    }

    /// Finish allocation
    pub fn into_pre_state(self) -> WorldState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_addresses_increase() {
        let mut alloc = AccountAllocator::new();
        let a = alloc.deploy_contract(vec![0x00], U256::zero(), 0).unwrap();
        let b = alloc.deploy_contract(vec![0x00], U256::from(3u64), 1).unwrap();
        assert_eq!(a, Address::from_low_u64_be(0x1000));
        assert_eq!(b, Address::from_low_u64_be(0x1100));

        let state = alloc.pre_state();
        assert_eq!(state.balance(&b), U256::from(3u64));
        assert_eq!(state.nonce(&b), 1);
        assert_eq!(state.get(&a).unwrap().code.as_ref(), &[0x00]);
    }

    #[test]
    fn test_first_eoa_uses_start_key() {
        let mut alloc = AccountAllocator::new();
        let eoa = alloc.fund_eoa(U256::from(0x300000u64)).unwrap();
        let expected = private_key_from_bytes(&EOA_START_KEY).unwrap();
        assert_eq!(eoa.address, private_key_to_address(&expected));
        assert_eq!(alloc.pre_state().balance(&eoa.address), U256::from(0x300000u64));
        assert!(alloc.key_for(&eoa.address).is_some());
    }

    #[test]
    fn test_eoas_are_distinct() {
        let mut alloc = AccountAllocator::new();
        let a = alloc.fund_eoa(U256::one()).unwrap();
        let b = alloc.fund_eoa(U256::one()).unwrap();
        assert_ne!(a.address, b.address);
        assert_eq!(alloc.pre_state().len(), 2);
    }

    #[test]
    fn test_deploy_with_storage() {
        let mut alloc = AccountAllocator::new();
        let address = alloc
            .deploy(
                Deployment::new(vec![0x00])
                    .storage(U256::one(), U256::from(7u64))
                    .storage(U256::from(2u64), U256::zero()),
            )
            .unwrap();
        let state = alloc.into_pre_state();
        assert_eq!(state.storage(&address, &U256::one()), U256::from(7u64));
        assert_eq!(state.get(&address).unwrap().storage().len(), 1);
    }

    #[test]
    fn test_collision_rejected() {
        let mut alloc = AccountAllocator::new();
        let key = private_key_from_bytes(&EOA_START_KEY).unwrap();
        alloc.fund_eoa_with_key(key.clone(), U256::one()).unwrap();
        let err = alloc.fund_eoa_with_key(key, U256::one()).unwrap_err();
        assert!(matches!(err, SetupError::AddressCollision(_)));

        let err = alloc
            .insert_account(Address::from_low_u64_be(0x1000), Account::default())
            .and_then(|_| alloc.deploy_contract(vec![0x00], U256::zero(), 0));
        assert!(matches!(err, Err(SetupError::AddressCollision(_))));
    }

    #[test]
    fn test_eoa_debug_hides_key() {
        let mut alloc = AccountAllocator::new();
        let eoa = alloc.fund_eoa(U256::one()).unwrap();
        let debug = format!("{:?}", eoa);
        assert!(debug.contains(&eoa.address.to_hex()));
        assert!(!debug.contains("45a915e4"));
    }
}
