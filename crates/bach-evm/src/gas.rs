//! Dynamic gas cost calculations.
//!
//! Static opcode costs live in the fork table; this module prices what
//! depends on operands or state, reading every constant from [`ForkRules`].

use crate::arith;
use bach_forks::{ForkRules, Param};
use bach_primitives::U256;

/// Number of 32-byte words covering `len` bytes
pub fn words(len: usize) -> u64 {
    (len as u64).div_ceil(32)
}

/// Total cost of holding `words` words of memory
pub fn memory_cost(rules: &ForkRules, words: u64) -> u64 {
    let linear = rules.value_or_zero(Param::MemoryWord).saturating_mul(words);
    linear.saturating_add(words.saturating_mul(words) / 512)
}

/// Calculate memory expansion cost
pub fn memory_gas(rules: &ForkRules, current_words: u64, new_words: u64) -> u64 {
    if new_words <= current_words {
        return 0;
    }
    memory_cost(rules, new_words).saturating_sub(memory_cost(rules, current_words))
}

/// Calculate copy cost (for CALLDATACOPY, CODECOPY, etc.)
pub fn copy_gas(rules: &ForkRules, length: usize) -> u64 {
    rules.value_or_zero(Param::CopyWord).saturating_mul(words(length))
}

/// Per-word part of KECCAK256 (and CREATE2 hashing)
pub fn keccak_word_gas(rules: &ForkRules, length: usize) -> u64 {
    rules.value_or_zero(Param::KeccakWord).saturating_mul(words(length))
}

/// Per-byte part of LOG
pub fn log_data_gas(rules: &ForkRules, data_size: usize) -> u64 {
    rules.value_or_zero(Param::LogData).saturating_mul(data_size as u64)
}

/// Per-byte part of EXP
pub fn exp_gas(rules: &ForkRules, exponent: U256) -> u64 {
    rules.value_or_zero(Param::ExpByte) * arith::byte_len(exponent)
}

/// EIP-2929 account access surcharge; zero before Berlin where the opcode's
/// static cost already covers it
pub fn account_access_gas(rules: &ForkRules, cold: bool) -> u64 {
    match (rules.value(Param::ColdAccountAccess), cold) {
        (Some(cold_cost), true) => cold_cost,
        (Some(_), false) => rules.value_or_zero(Param::WarmStorageRead),
        (None, _) => 0,
    }
}

/// EIP-2929 SLOAD surcharge; zero before Berlin
pub fn sload_gas(rules: &ForkRules, cold: bool) -> u64 {
    match (rules.value(Param::ColdSload), cold) {
        (Some(cold_cost), true) => cold_cost,
        (Some(_), false) => rules.value_or_zero(Param::WarmStorageRead),
        (None, _) => 0,
    }
}

/// Storage slot values seen by one SSTORE
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SstoreSlot {
    /// Value at transaction start
    pub original: U256,
    /// Value before this write
    pub current: U256,
    /// Value being written
    pub new: U256,
}

/// Gas and refund delta of one SSTORE
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SstoreCost {
    /// Gas charged
    pub gas: u64,
    /// Change to the refund counter
    pub refund: i64,
}

/// Price an SSTORE. `cold` adds the Berlin cold-slot surcharge.
pub fn sstore_cost(rules: &ForkRules, slot: SstoreSlot, cold: bool) -> SstoreCost {
    let set = rules.value_or_zero(Param::SstoreSet);
    let reset = rules.value_or_zero(Param::SstoreReset);
    let clear = rules.value_or_zero(Param::SstoreClearRefund) as i64;
    let cold_gas = if cold {
        rules.value_or_zero(Param::ColdSload)
    } else {
        0
    };

    let SstoreSlot {
        original,
        current,
        new,
    } = slot;

    if !rules.is_active(Param::NetSstoreMetering) {
        let gas = if current.is_zero() && !new.is_zero() {
            set
        } else {
            reset
        };
        let refund = if !current.is_zero() && new.is_zero() {
            clear
        } else {
            0
        };
        return SstoreCost {
            gas: gas + cold_gas,
            refund,
        };
    }

    // EIP-1283, then EIP-2200, repriced by EIP-2929
    let noop = rules.value_or_zero(Param::SstoreNoop);

    let mut refund = 0i64;
    let gas = if current == new {
        noop
    } else if original == current {
        if original.is_zero() {
            set
        } else {
            if new.is_zero() {
                refund += clear;
            }
            reset
        }
    } else {
        if !original.is_zero() {
            if current.is_zero() {
                refund -= clear;
            } else if new.is_zero() {
                refund += clear;
            }
        }
        if original == new {
            let restored = if original.is_zero() { set } else { reset };
            refund += restored as i64 - noop as i64;
        }
        noop
    };

    SstoreCost {
        gas: gas + cold_gas,
        refund,
    }
}

/// Gas forwarded to a child frame. Before EIP-150 the full request must be
/// available; after it the request is capped at all but one 64th.
pub fn call_gas(rules: &ForkRules, requested: U256, available: u64) -> Option<u64> {
    if rules.is_active(Param::AllButOne64th) {
        let cap = available - available / 64;
        Some(arith::as_u64_saturated(requested).min(cap))
    } else {
        let requested = arith::as_u64_saturated(requested);
        (requested <= available).then_some(requested)
    }
}

/// Gas forwarded to a CREATE child frame
pub fn create_gas(rules: &ForkRules, available: u64) -> u64 {
    if rules.is_active(Param::AllButOne64th) {
        available - available / 64
    } else {
        available
    }
}

/// Per-word init code charge (EIP-3860)
pub fn init_code_gas(rules: &ForkRules, length: usize) -> u64 {
    rules.value_or_zero(Param::InitCodeWord).saturating_mul(words(length))
}

/// Code deposit charge
pub fn code_deposit_gas(rules: &ForkRules, length: usize) -> u64 {
    rules.value_or_zero(Param::CodeDepositByte).saturating_mul(length as u64)
}
