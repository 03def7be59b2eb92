//! DUP1..DUP16 over a stack of 0..=16

use super::Code;
use crate::allocator::AccountAllocator;
use crate::builder::TransactionBuilder;
use crate::scenario::{Scenario, ScenarioInput, ScenarioSpec};
use crate::verifier::{ExpectedAccount, ExpectedPostState};
use crate::SetupResult;
use bach_evm::Opcode;
use bach_forks::{Fork, ForkRange};
use bach_primitives::U256;
use bach_types::Environment;

const SENDER_BALANCE: u64 = 0x0BA1_A9CE_0BA1_A9CE;

/// Push 0..=16, DUPn, then store the 18 stack items into slots 0..=16
fn code(n: u8) -> bytes::Bytes {
    let mut code = Code::new();
    for value in 0..=0x10u64 {
        code = code.push(value);
    }
    code = code.dup(n);
    for slot in 0..=0x10u64 {
        code = code.push(slot).op(Opcode::SSTORE);
    }
    code.build()
}

fn build(n: u8, input: &ScenarioInput<'_>) -> SetupResult<ScenarioSpec> {
    let mut alloc = AccountAllocator::new();
    let contract = alloc.deploy_contract(code(n), U256::zero(), 0)?;
    let sender = alloc.fund_eoa(U256::from(SENDER_BALANCE))?;

    let tx = TransactionBuilder::call(sender.address, contract)
        .gas_limit(500_000)
        .protected(input.fork >= Fork::Byzantium)
        .build(&alloc, input.rules, input.chain_id)?;

    // Slot 0 holds the duplicate, slots 1..=16 the original stack top down
    let mut expected = ExpectedAccount::default().storage(U256::zero(), U256::from(17 - n));
    for slot in 1..=16u64 {
        expected = expected.storage(U256::from(slot), U256::from(17 - slot));
    }

    Ok(ScenarioSpec {
        env: Environment::with_chain_id(input.chain_id),
        pre: alloc.into_pre_state(),
        tx,
        post: ExpectedPostState::new()
            .account(contract, expected)
            .account(sender.address, ExpectedAccount::default().nonce(1)),
    })
}

pub(super) fn scenarios() -> Vec<Scenario> {
    (1..=16u8)
        .map(|n| {
            Scenario::new(format!("stack/DUP{n}"), ForkRange::all(), move |input| {
                build(n, input)
            })
        })
        .collect()
}
