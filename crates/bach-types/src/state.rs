//! Ephemeral world state

use crate::account::Account;
use bach_primitives::{Address, U256};
use std::collections::btree_map::{self, BTreeMap};

/// Mapping address → account, one account per address.
///
/// `WorldState` is a plain value: cloning produces an independent snapshot,
/// so the pre-state handed to the engine is never mutated in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldState {
    accounts: BTreeMap<Address, Account>,
}

impl WorldState {
    /// Empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Account at `address`
    pub fn get(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Mutable account at `address`
    pub fn get_mut(&mut self, address: &Address) -> Option<&mut Account> {
        self.accounts.get_mut(address)
    }

    /// Account at `address`, created empty if missing
    pub fn entry(&mut self, address: Address) -> &mut Account {
        self.accounts.entry(address).or_default()
    }

    /// Insert or replace an account, returning the previous one
    pub fn insert(&mut self, address: Address, account: Account) -> Option<Account> {
        self.accounts.insert(address, account)
    }

    /// Remove an account
    pub fn remove(&mut self, address: &Address) -> Option<Account> {
        self.accounts.remove(address)
    }

    /// Whether an account exists at `address`
    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// Balance, zero when absent
    pub fn balance(&self, address: &Address) -> U256 {
        self.get(address).map(|a| a.balance).unwrap_or_default()
    }

    /// Nonce, zero when absent
    pub fn nonce(&self, address: &Address) -> u64 {
        self.get(address).map(|a| a.nonce).unwrap_or_default()
    }

    /// Storage slot, zero when absent
    pub fn storage(&self, address: &Address, key: &U256) -> U256 {
        self.get(address)
            .map(|a| a.storage_get(key))
            .unwrap_or_default()
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Check if there are no accounts
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Accounts in address order
    pub fn iter(&self) -> btree_map::Iter<'_, Address, Account> {
        self.accounts.iter()
    }

    /// Accounts that differ between `self` (before) and `after`
    pub fn diff(&self, after: &WorldState) -> StateDiff {
        let mut changes = BTreeMap::new();
        for (address, before) in &self.accounts {
            let now = after.get(address);
            if now != Some(before) {
                changes.insert(
                    *address,
                    AccountChange {
                        before: Some(before.clone()),
                        after: now.cloned(),
                    },
                );
            }
        }
        for (address, account) in &after.accounts {
            if !self.contains(address) {
                changes.insert(
                    *address,
                    AccountChange {
                        before: None,
                        after: Some(account.clone()),
                    },
                );
            }
        }
        StateDiff { changes }
    }
}

impl FromIterator<(Address, Account)> for WorldState {
    fn from_iter<I: IntoIterator<Item = (Address, Account)>>(iter: I) -> Self {
        WorldState {
            accounts: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a WorldState {
    type Item = (&'a Address, &'a Account);
    type IntoIter = btree_map::Iter<'a, Address, Account>;

    fn into_iter(self) -> Self::IntoIter {
        self.accounts.iter()
    }
}

/// Before/after of one account; `None` means absent
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountChange {
    /// Account before execution
    pub before: Option<Account>,
    /// Account after execution
    pub after: Option<Account>,
}

/// Accounts changed by an execution, in address order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateDiff {
    /// Changed accounts
    pub changes: BTreeMap<Address, AccountChange>,
}

impl StateDiff {
    /// Check if nothing changed
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Change record for `address`
    pub fn get(&self, address: &Address) -> Option<&AccountChange> {
        self.changes.get(address)
    }
}
