//! Precompiled bytecode handles
//!
//! Scenarios never compile source. A compiled artifact arrives as opaque
//! bytes plus the static gas the compiler assumed for each opcode it used,
//! and that table is checked against the fork before the code is deployed.

use crate::error::{SetupError, SetupResult};
use bach_forks::ForkRules;
use bytes::Bytes;
use std::collections::BTreeMap;

/// Opaque compiled code with its opcode gas assumptions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledCode {
    bytes: Bytes,
    gas_table: BTreeMap<u8, u64>,
}

impl CompiledCode {
    /// Wrap compiler output
    pub fn new(bytes: impl Into<Bytes>, gas_table: impl IntoIterator<Item = (u8, u64)>) -> Self {
        Self {
            bytes: bytes.into(),
            gas_table: gas_table.into_iter().collect(),
        }
    }

    /// Code bytes
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Opcode → static gas the compiler assumed
    pub fn gas_table(&self) -> &BTreeMap<u8, u64> {
        &self.gas_table
    }

    /// Check every table entry against the static gas at `rules`' fork
    pub fn check(&self, rules: &ForkRules) -> SetupResult<()> {
        for (&opcode, &table) in &self.gas_table {
            let fork = rules.opcode_gas(opcode);
            if fork != Some(table) {
                return Err(SetupError::GasTableMismatch {
                    opcode,
                    table,
                    fork,
                });
            }
        }
        Ok(())
    }

    /// Checked code bytes, ready to deploy
    pub fn for_fork(&self, rules: &ForkRules) -> SetupResult<Bytes> {
        self.check(rules)?;
        Ok(self.bytes.clone())
    }
}

/// Adds two constants through an internal function and stores the sum in
/// slot 0, then returns one zero word.
pub fn add_and_store() -> CompiledCode {
    CompiledCode::new(
        vec![
            0x60, 0x09, // PUSH1 0x09 (return label)
            0x60, 0x02, // PUSH1 2
            0x60, 0x01, // PUSH1 1
            0x60, 0x12, // PUSH1 0x12 (add)
            0x56, // JUMP
            0x5b, // JUMPDEST
            0x60, 0x00, // PUSH1 0
            0x55, // SSTORE
            0x60, 0x20, // PUSH1 0x20
            0x60, 0x00, // PUSH1 0
            0xf3, // RETURN
            0x5b, // JUMPDEST
            0x01, // ADD
            0x90, // SWAP1
            0x56, // JUMP
        ],
        [
            (0x01, 3),
            (0x55, 0),
            (0x56, 8),
            (0x5b, 1),
            (0x60, 3),
            (0x90, 3),
            (0xf3, 0),
        ],
    )
}

/// Look up a compiled artifact by name
pub fn by_name(name: &str) -> Option<CompiledCode> {
    match name {
        "add_and_store" => Some(add_and_store()),
        _ => None,
    }
}
