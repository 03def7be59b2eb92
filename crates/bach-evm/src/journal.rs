//! Journaled world state.
//!
//! Every mutation made while executing a transaction is recorded as a
//! [`JournalEntry`]; reverting a frame pops entries back to its checkpoint
//! and undoes them in reverse order.

use crate::error::{EvmError, EvmResult, Log};
use bach_primitives::{Address, U256};
use bach_types::{Account, WorldState};
use bytes::Bytes;
use std::collections::{BTreeSet, HashMap, HashSet};

/// One undoable change
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalEntry {
    /// Address added to the warm set
    AccountWarmed(Address),
    /// Slot added to the warm set
    StorageWarmed(Address, U256),
    /// Account did not exist before
    AccountCreated(Address),
    /// Account replaced wholesale by a contract creation
    AccountReplaced {
        /// Address
        address: Address,
        /// Account before replacement
        previous: Account,
    },
    /// Balance changed
    BalanceChange {
        /// Address
        address: Address,
        /// Previous balance
        previous: U256,
    },
    /// Nonce changed
    NonceChange {
        /// Address
        address: Address,
        /// Previous nonce
        previous: u64,
    },
    /// Code changed
    CodeChange {
        /// Address
        address: Address,
        /// Previous code
        previous: Bytes,
    },
    /// Storage slot changed
    StorageChange {
        /// Address
        address: Address,
        /// Slot
        key: U256,
        /// Previous value
        previous: U256,
    },
    /// Transient storage slot changed
    TransientStorageChange {
        /// Address
        address: Address,
        /// Slot
        key: U256,
        /// Previous value
        previous: U256,
    },
    /// Address added to the touched set
    AccountTouched(Address),
    /// Address recorded as created in this transaction
    CreatedInTx(Address),
    /// Address scheduled for destruction
    Destructed(Address),
    /// Refund counter changed
    RefundChange {
        /// Previous counter
        previous: i64,
    },
}

/// Position to revert to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    entries: usize,
    logs: usize,
}

/// World state plus the per-transaction bookkeeping the EVM needs
#[derive(Clone, Debug)]
pub struct JournaledState {
    state: WorldState,
    original: WorldState,
    warm_accounts: HashSet<Address>,
    warm_slots: HashSet<(Address, U256)>,
    transient: HashMap<(Address, U256), U256>,
    touched: BTreeSet<Address>,
    created: HashSet<Address>,
    destructed: BTreeSet<Address>,
    logs: Vec<Log>,
    refund: i64,
    entries: Vec<JournalEntry>,
}

impl JournaledState {
    /// Start a transaction on top of `pre`
    pub fn new(pre: WorldState) -> Self {
        Self {
            original: pre.clone(),
            state: pre,
            warm_accounts: HashSet::new(),
            warm_slots: HashSet::new(),
            transient: HashMap::new(),
            touched: BTreeSet::new(),
            created: HashSet::new(),
            destructed: BTreeSet::new(),
            logs: Vec::new(),
            refund: 0,
            entries: Vec::new(),
        }
    }

    // ==================== Checkpoints ====================

    /// Mark the current position
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            entries: self.entries.len(),
            logs: self.logs.len(),
        }
    }

    /// Undo everything recorded since `checkpoint`
    pub fn revert(&mut self, checkpoint: Checkpoint) {
        while self.entries.len() > checkpoint.entries {
            if let Some(entry) = self.entries.pop() {
                self.undo(entry);
            }
        }
        self.logs.truncate(checkpoint.logs);
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::AccountWarmed(address) => {
                self.warm_accounts.remove(&address);
            }
            JournalEntry::StorageWarmed(address, key) => {
                self.warm_slots.remove(&(address, key));
            }
            JournalEntry::AccountCreated(address) => {
                self.state.remove(&address);
            }
            JournalEntry::AccountReplaced { address, previous } => {
                self.state.insert(address, previous);
            }
            JournalEntry::BalanceChange { address, previous } => {
                if let Some(account) = self.state.get_mut(&address) {
                    account.balance = previous;
                }
            }
            JournalEntry::NonceChange { address, previous } => {
                if let Some(account) = self.state.get_mut(&address) {
                    account.nonce = previous;
                }
            }
            JournalEntry::CodeChange { address, previous } => {
                if let Some(account) = self.state.get_mut(&address) {
                    account.code = previous;
                }
            }
            JournalEntry::StorageChange {
                address,
                key,
                previous,
            } => {
                if let Some(account) = self.state.get_mut(&address) {
                    account.storage_set(key, previous);
                }
            }
            JournalEntry::TransientStorageChange {
                address,
                key,
                previous,
            } => {
                if previous.is_zero() {
                    self.transient.remove(&(address, key));
                } else {
                    self.transient.insert((address, key), previous);
                }
            }
            JournalEntry::AccountTouched(address) => {
                self.touched.remove(&address);
            }
            JournalEntry::CreatedInTx(address) => {
                self.created.remove(&address);
            }
            JournalEntry::Destructed(address) => {
                self.destructed.remove(&address);
            }
            JournalEntry::RefundChange { previous } => {
                self.refund = previous;
            }
        }
    }

    // ==================== Reads ====================

    /// Account at `address`
    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.state.get(address)
    }

    /// Whether an account exists
    pub fn exists(&self, address: &Address) -> bool {
        self.state.contains(address)
    }

    /// Missing or EIP-161 empty
    pub fn is_empty(&self, address: &Address) -> bool {
        self.state.get(address).map_or(true, Account::is_empty)
    }

    /// Balance, zero when absent
    pub fn balance(&self, address: &Address) -> U256 {
        self.state.balance(address)
    }

    /// Nonce, zero when absent
    pub fn nonce(&self, address: &Address) -> u64 {
        self.state.nonce(address)
    }

    /// Code, empty when absent
    pub fn code(&self, address: &Address) -> Bytes {
        self.state
            .get(address)
            .map(|account| account.code.clone())
            .unwrap_or_default()
    }

    /// Current storage value
    pub fn sload(&self, address: &Address, key: &U256) -> U256 {
        self.state.storage(address, key)
    }

    /// Storage value at transaction start
    pub fn original_storage(&self, address: &Address, key: &U256) -> U256 {
        self.original.storage(address, key)
    }

    /// Transient storage value
    pub fn tload(&self, address: &Address, key: &U256) -> U256 {
        self.transient
            .get(&(*address, *key))
            .copied()
            .unwrap_or_default()
    }

    /// Current refund counter
    pub fn refund(&self) -> i64 {
        self.refund
    }

    /// Whether `address` was created by this transaction
    pub fn created_in_tx(&self, address: &Address) -> bool {
        self.created.contains(address)
    }

    /// Whether `address` is scheduled for destruction
    pub fn is_destructed(&self, address: &Address) -> bool {
        self.destructed.contains(address)
    }

    // ==================== Access lists ====================

    /// Warm an account; returns true if it was cold
    pub fn warm_account(&mut self, address: Address) -> bool {
        let cold = self.warm_accounts.insert(address);
        if cold {
            self.entries.push(JournalEntry::AccountWarmed(address));
        }
        cold
    }

    /// Warm a slot; returns true if it was cold
    pub fn warm_slot(&mut self, address: Address, key: U256) -> bool {
        let cold = self.warm_slots.insert((address, key));
        if cold {
            self.entries.push(JournalEntry::StorageWarmed(address, key));
        }
        cold
    }

    /// Whether an account is warm
    pub fn is_warm(&self, address: &Address) -> bool {
        self.warm_accounts.contains(address)
    }

    // ==================== Writes ====================

    fn account_mut(&mut self, address: Address) -> &mut Account {
        if !self.state.contains(&address) {
            self.entries.push(JournalEntry::AccountCreated(address));
        }
        self.state.entry(address)
    }

    /// Record `address` as touched (EIP-161)
    pub fn touch(&mut self, address: Address) {
        if self.touched.insert(address) {
            self.entries.push(JournalEntry::AccountTouched(address));
        }
    }

    /// Make sure an account exists, creating an empty one
    pub fn load_or_create(&mut self, address: Address) {
        self.account_mut(address);
    }

    /// Overwrite a balance
    pub fn set_balance(&mut self, address: Address, balance: U256) {
        let account = self.account_mut(address);
        let previous = std::mem::replace(&mut account.balance, balance);
        self.entries
            .push(JournalEntry::BalanceChange { address, previous });
    }

    /// Add to a balance, creating the account if needed
    pub fn add_balance(&mut self, address: Address, amount: U256) {
        let balance = self.balance(&address).saturating_add(amount);
        self.set_balance(address, balance);
    }

    /// Subtract from a balance
    pub fn sub_balance(&mut self, address: Address, amount: U256) -> EvmResult<()> {
        let balance = self.balance(&address);
        if balance < amount {
            return Err(EvmError::InsufficientFunds {
                required: amount,
                balance,
            });
        }
        self.set_balance(address, balance - amount);
        Ok(())
    }

    /// Move value between accounts, touching both
    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> EvmResult<()> {
        self.sub_balance(from, value)?;
        self.add_balance(to, value);
        self.touch(from);
        self.touch(to);
        Ok(())
    }

    /// Increment a nonce
    pub fn bump_nonce(&mut self, address: Address) {
        let account = self.account_mut(address);
        let previous = account.nonce;
        account.nonce = previous.saturating_add(1);
        self.entries
            .push(JournalEntry::NonceChange { address, previous });
    }

    /// Install code
    pub fn set_code(&mut self, address: Address, code: Bytes) {
        let account = self.account_mut(address);
        let previous = std::mem::replace(&mut account.code, code);
        self.entries
            .push(JournalEntry::CodeChange { address, previous });
    }

    /// Write a storage slot
    pub fn sstore(&mut self, address: Address, key: U256, value: U256) {
        let previous = self.account_mut(address).storage_set(key, value);
        self.entries.push(JournalEntry::StorageChange {
            address,
            key,
            previous,
        });
    }

    /// Write a transient storage slot
    pub fn tstore(&mut self, address: Address, key: U256, value: U256) {
        let previous = if value.is_zero() {
            self.transient.remove(&(address, key))
        } else {
            self.transient.insert((address, key), value)
        }
        .unwrap_or_default();
        self.entries.push(JournalEntry::TransientStorageChange {
            address,
            key,
            previous,
        });
    }

    /// Turn `address` into a fresh contract account: balance kept, storage
    /// and code cleared, nonce set to `nonce`
    pub fn create_account(&mut self, address: Address, nonce: u64) {
        let account = match self.state.get(&address) {
            Some(previous) => {
                let fresh = Account::with_code(Bytes::new(), previous.balance, nonce);
                self.entries.push(JournalEntry::AccountReplaced {
                    address,
                    previous: previous.clone(),
                });
                fresh
            }
            None => {
                self.entries.push(JournalEntry::AccountCreated(address));
                Account::with_code(Bytes::new(), U256::zero(), nonce)
            }
        };
        self.state.insert(address, account);
        if self.created.insert(address) {
            self.entries.push(JournalEntry::CreatedInTx(address));
        }
    }

    /// Schedule `address` for removal at the end of the transaction;
    /// returns true if it was not already scheduled
    pub fn mark_destructed(&mut self, address: Address) -> bool {
        let fresh = self.destructed.insert(address);
        if fresh {
            self.entries.push(JournalEntry::Destructed(address));
        }
        fresh
    }

    /// Adjust the refund counter
    pub fn add_refund(&mut self, delta: i64) {
        if delta == 0 {
            return;
        }
        self.entries.push(JournalEntry::RefundChange {
            previous: self.refund,
        });
        self.refund += delta;
    }

    /// Append a log
    pub fn log(&mut self, log: Log) {
        self.logs.push(log);
    }

    // ==================== Finalisation ====================

    /// Apply end-of-transaction rules and hand back the post-state.
    ///
    /// Destructed accounts are deleted; with `cleanup_empty`, touched
    /// accounts left empty are deleted too (EIP-161).
    pub fn finalize(mut self, cleanup_empty: bool) -> (WorldState, Vec<Log>) {
        for address in &self.destructed {
            self.state.remove(address);
        }
        if cleanup_empty {
            for address in &self.touched {
                if self.state.get(address).is_some_and(Account::is_empty) {
                    self.state.remove(address);
                }
            }
        }
        (self.state, self.logs)
    }
}
