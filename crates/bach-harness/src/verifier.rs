//! Post-state verification
//!
//! Compares an execution's resulting world state against a partial
//! expectation. Every mismatch is collected; verification never stops at
//! the first one.

use bach_primitives::{Address, U256};
use bach_types::{Account, WorldState};
use bytes::Bytes;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Expected fields of one account; `None` fields are unconstrained
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpectedAccount {
    /// Expected balance
    pub balance: Option<U256>,
    /// Expected nonce
    pub nonce: Option<u64>,
    /// Expected code
    pub code: Option<Bytes>,
    /// Expected storage; when set, slots not listed must be zero
    pub storage: Option<BTreeMap<U256, U256>>,
}

impl ExpectedAccount {
    /// Expect the balance
    pub fn balance(mut self, balance: U256) -> Self {
        self.balance = Some(balance);
        self
    }

    /// Expect the nonce
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Expect the code
    pub fn code(mut self, code: impl Into<Bytes>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Expect one storage slot. Enables exact storage comparison.
    pub fn storage(mut self, key: U256, value: U256) -> Self {
        self.storage.get_or_insert_with(BTreeMap::new).insert(key, value);
        self
    }

    /// Expect storage to hold nothing
    pub fn empty_storage(mut self) -> Self {
        self.storage = Some(BTreeMap::new());
        self
    }
}

/// What must hold for one address
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expectation {
    /// Account exists and matches the given fields
    Present(ExpectedAccount),
    /// Account does not exist
    Absent,
}

/// Expected post-state: addresses not listed are unconstrained
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExpectedPostState {
    accounts: BTreeMap<Address, Expectation>,
}

impl ExpectedPostState {
    /// No expectations
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `account` at `address`
    pub fn account(mut self, address: Address, account: ExpectedAccount) -> Self {
        self.accounts.insert(address, Expectation::Present(account));
        self
    }

    /// Expect `address` to be absent
    pub fn absent(mut self, address: Address) -> Self {
        self.accounts.insert(address, Expectation::Absent);
        self
    }

    /// Add an expectation in place
    pub fn insert(&mut self, address: Address, expectation: Expectation) {
        self.accounts.insert(address, expectation);
    }

    /// Number of constrained addresses
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Check if nothing is constrained
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Iterate expectations in address order
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Expectation)> {
        self.accounts.iter()
    }
}

/// Which part of an account disagreed
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Field {
    /// Account presence
    Existence,
    /// Balance
    Balance,
    /// Nonce
    Nonce,
    /// Code
    Code,
    /// One storage slot
    Storage(U256),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Existence => f.write_str("existence"),
            Field::Balance => f.write_str("balance"),
            Field::Nonce => f.write_str("nonce"),
            Field::Code => f.write_str("code"),
            Field::Storage(key) => write!(f, "storage[{:#x}]", key),
        }
    }
}

/// One disagreement between expected and actual state
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Account
    pub address: Address,
    /// Field
    pub field: Field,
    /// Expected value, rendered
    pub expected: String,
    /// Actual value, rendered
    pub actual: String,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: expected {}, got {}",
            self.address, self.field, self.expected, self.actual
        )
    }
}

/// Stateless comparator
#[derive(Clone, Copy, Debug, Default)]
pub struct PostStateVerifier;

impl PostStateVerifier {
    /// Compare `actual` against `expected`, returning every mismatch in
    /// (address, field) order
    pub fn verify(&self, expected: &ExpectedPostState, actual: &WorldState) -> Vec<Mismatch> {
        let mut mismatches = Vec::new();
        for (address, expectation) in expected.iter() {
            match (expectation, actual.get(address)) {
                (Expectation::Absent, None) => {}
                (Expectation::Absent, Some(_)) => mismatches.push(Mismatch {
                    address: *address,
                    field: Field::Existence,
                    expected: "absent".into(),
                    actual: "present".into(),
                }),
                (Expectation::Present(_), None) => mismatches.push(Mismatch {
                    address: *address,
                    field: Field::Existence,
                    expected: "present".into(),
                    actual: "absent".into(),
                }),
                (Expectation::Present(want), Some(account)) => {
                    compare_account(*address, want, account, &mut mismatches)
                }
            }
        }
        mismatches
    }
}

fn compare_account(
    address: Address,
    want: &ExpectedAccount,
    account: &Account,
    out: &mut Vec<Mismatch>,
) {
    let mut push = |field, expected: String, actual: String| {
        out.push(Mismatch {
            address,
            field,
            expected,
            actual,
        })
    };

    if let Some(balance) = want.balance {
        if balance != account.balance {
            push(Field::Balance, word(balance), word(account.balance));
        }
    }
    if let Some(nonce) = want.nonce {
        if nonce != account.nonce {
            push(Field::Nonce, nonce.to_string(), account.nonce.to_string());
        }
    }
    if let Some(code) = &want.code {
        if *code != account.code {
            push(Field::Code, bytes(code), bytes(&account.code));
        }
    }
    if let Some(storage) = &want.storage {
        let keys: BTreeSet<&U256> = storage.keys().chain(account.storage().keys()).collect();
        for key in keys {
            let expected = storage.get(key).copied().unwrap_or_default();
            let actual = account.storage_get(key);
            if expected != actual {
                push(Field::Storage(*key), word(expected), word(actual));
            }
        }
    }
}

fn word(value: U256) -> String {
    format!("{:#x}", value)
}

fn bytes(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}
