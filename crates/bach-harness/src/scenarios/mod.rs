//! Built-in scenario suite

mod access_list;
mod add_store;
mod call_stipend;
mod chainid;
mod dup;

use crate::scenario::Scenario;
use bach_evm::Opcode;
use bach_primitives::{Address, U256};
use bytes::Bytes;

/// Every built-in scenario
pub fn builtin() -> Vec<Scenario> {
    let mut scenarios = Vec::new();
    scenarios.extend(dup::scenarios());
    scenarios.push(chainid::scenario());
    scenarios.extend(call_stipend::scenarios());
    scenarios.push(access_list::scenario());
    scenarios.push(add_store::scenario());
    scenarios
}

/// Minimal bytecode assembler for scenario contracts
#[derive(Clone, Debug, Default)]
pub(crate) struct Code(Vec<u8>);

impl Code {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Shortest PUSH holding `value`; zero is PUSH1 0 so the code runs on
    /// every fork
    pub(crate) fn push(mut self, value: impl Into<U256>) -> Self {
        let value = value.into();
        let mut word = [0u8; 32];
        value.to_big_endian(&mut word);
        let len = ((value.bits() + 7) / 8).max(1);
        self.0.push(Opcode::PUSH1 as u8 + (len - 1) as u8);
        self.0.extend_from_slice(&word[32 - len..]);
        self
    }

    /// PUSH20 `address`
    pub(crate) fn push_address(mut self, address: Address) -> Self {
        self.0.push(Opcode::PUSH20 as u8);
        self.0.extend_from_slice(address.as_bytes());
        self
    }

    pub(crate) fn op(mut self, op: Opcode) -> Self {
        self.0.push(op as u8);
        self
    }

    /// DUP`n`, 1 ≤ n ≤ 16
    pub(crate) fn dup(mut self, n: u8) -> Self {
        self.0.push(Opcode::DUP1 as u8 + n - 1);
        self
    }

    /// SSTORE(key, value) with both pushed
    pub(crate) fn sstore(self, key: u64, value: u64) -> Self {
        self.push(value).push(key).op(Opcode::SSTORE)
    }

    pub(crate) fn build(self) -> Bytes {
        Bytes::from(self.0)
    }
}
