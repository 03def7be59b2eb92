//! Intrinsic gas: the fixed cost charged before any code runs

use crate::transaction::Transaction;
use bach_forks::{ForkRules, Param};

/// Intrinsic gas of `tx` under `rules`.
///
/// Base cost, creation surcharge, calldata bytes, access list entries and
/// (from Shanghai) init code words. Saturates instead of overflowing so an
/// absurd transaction simply fails the gas-limit check.
pub fn intrinsic_gas(tx: &Transaction, rules: &ForkRules) -> u64 {
    let data = tx.data();
    let zero_bytes = data.iter().filter(|&&b| b == 0).count() as u64;
    let nonzero_bytes = data.len() as u64 - zero_bytes;

    let mut gas = rules.value_or_zero(Param::TxBase);
    gas = gas.saturating_add(zero_bytes.saturating_mul(rules.value_or_zero(Param::TxDataZero)));
    gas = gas.saturating_add(
        nonzero_bytes.saturating_mul(rules.value_or_zero(Param::TxDataNonZero)),
    );

    if tx.is_create() {
        gas = gas.saturating_add(rules.value_or_zero(Param::TxCreate));
        let words = (data.len() as u64).div_ceil(32);
        gas = gas.saturating_add(words.saturating_mul(rules.value_or_zero(Param::InitCodeWord)));
    }

    let access_list = tx.access_list();
    let keys: u64 = access_list.iter().map(|item| item.storage_keys.len() as u64).sum();
    gas = gas.saturating_add(
        (access_list.len() as u64).saturating_mul(rules.value_or_zero(Param::AccessListAddress)),
    );
    gas.saturating_add(keys.saturating_mul(rules.value_or_zero(Param::AccessListStorageKey)))
}
