//! Value-transfer stipend goes to the callee frame only
//!
//! The caller gives the callee exactly enough gas for a value-carrying
//! CALL or CALLCODE, or one less. The stipend must not cover the gap.

use super::Code;
use crate::allocator::AccountAllocator;
use crate::builder::TransactionBuilder;
use crate::scenario::{Scenario, ScenarioInput, ScenarioSpec};
use crate::verifier::{ExpectedAccount, ExpectedPostState};
use crate::SetupResult;
use bach_evm::Opcode;
use bach_forks::{Fork, ForkRange};
use bach_primitives::{Address, U256};
use bach_types::Environment;

/// Receives the inner value transfer; never allocated
const RECIPIENT: Address = Address::from_bytes([
    0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
]);

const CONTRACT_BALANCE: u64 = 3;

/// Callee gas that exactly covers the inner call; one less fails
const CALL_GAS: u64 = 36_620;
const CALLCODE_GAS: u64 = 11_620;

/// opcode(GAS, RECIPIENT, 1, 0, 0, 0, 0)
fn callee_code(opcode: Opcode) -> bytes::Bytes {
    Code::new()
        .push(0u64)
        .push(0u64)
        .push(0u64)
        .push(0u64)
        .push(1u64)
        .push_address(RECIPIENT)
        .op(Opcode::GAS)
        .op(opcode)
        .build()
}

/// SSTORE(0, CALL(gas, callee, 0, 0, 0, 0, 0))
fn caller_code(callee: Address, gas: u64) -> bytes::Bytes {
    Code::new()
        .push(0u64)
        .push(0u64)
        .push(0u64)
        .push(0u64)
        .push(0u64)
        .push_address(callee)
        .push(gas)
        .op(Opcode::CALL)
        .push(0u64)
        .op(Opcode::SSTORE)
        .build()
}

fn build(opcode: Opcode, gas: u64, input: &ScenarioInput<'_>) -> SetupResult<ScenarioSpec> {
    let mut alloc = AccountAllocator::new();
    let callee =
        alloc.deploy_contract(callee_code(opcode), U256::from(CONTRACT_BALANCE), 1)?;
    let caller =
        alloc.deploy_contract(caller_code(callee, gas), U256::from(CONTRACT_BALANCE), 1)?;
    let sender = alloc.fund_eoa(U256::from(0x0BA1_A9CEu64))?;

    let tx = TransactionBuilder::call(sender.address, caller)
        .value(U256::one())
        .gas_limit(500_000)
        .build(&alloc, input.rules, input.chain_id)?;

    let succeeds = gas >= stipend_gas(opcode);
    let mut post = ExpectedPostState::new().account(
        caller,
        ExpectedAccount::default()
            .balance(U256::from(CONTRACT_BALANCE + 1))
            .storage(U256::zero(), U256::from(u64::from(succeeds))),
    );
    if opcode == Opcode::CALL {
        let callee_balance = CONTRACT_BALANCE - u64::from(succeeds);
        post = post.account(callee, ExpectedAccount::default().balance(U256::from(callee_balance)));
        post = if succeeds {
            post.account(RECIPIENT, ExpectedAccount::default().balance(U256::one()))
        } else {
            post.absent(RECIPIENT)
        };
    }

    Ok(ScenarioSpec {
        env: Environment::with_chain_id(input.chain_id),
        pre: alloc.into_pre_state(),
        tx,
        post,
    })
}

fn stipend_gas(opcode: Opcode) -> u64 {
    match opcode {
        Opcode::CALLCODE => CALLCODE_GAS,
        _ => CALL_GAS,
    }
}

pub(super) fn scenarios() -> Vec<Scenario> {
    let range = ForkRange {
        from: Fork::London,
        until: Some(Fork::Shanghai),
    };
    let mut scenarios = Vec::new();
    for opcode in [Opcode::CALL, Opcode::CALLCODE] {
        let exact = stipend_gas(opcode);
        for (suffix, gas) in [("exact", exact), ("short", exact - 1)] {
            let name = format!("calls/stipend_{}_{}", opcode.name().to_lowercase(), suffix);
            scenarios.push(Scenario::new(name, range, move |input| {
                build(opcode, gas, input)
            }));
        }
    }
    scenarios
}
