//! Precompiled code that adds two constants through an internal jump and
//! stores the sum

use crate::allocator::AccountAllocator;
use crate::builder::TransactionBuilder;
use crate::compiled;
use crate::scenario::{Scenario, ScenarioInput, ScenarioSpec};
use crate::verifier::{ExpectedAccount, ExpectedPostState};
use crate::SetupResult;
use bach_forks::{Fork, ForkRange};
use bach_primitives::U256;
use bach_types::Environment;

const BALANCE: u64 = 0x0BA1_A9CE_0BA1_A9CE;

fn build(input: &ScenarioInput<'_>) -> SetupResult<ScenarioSpec> {
    let code = compiled::add_and_store().for_fork(input.rules)?;
    let mut alloc = AccountAllocator::new();
    let contract = alloc.deploy_contract(code, U256::from(BALANCE), 0)?;
    let sender = alloc.fund_eoa(U256::from(BALANCE))?;

    let tx = TransactionBuilder::call(sender.address, contract)
        .gas_limit(500_000)
        .protected(input.fork >= Fork::Byzantium)
        .build(&alloc, input.rules, input.chain_id)?;

    Ok(ScenarioSpec {
        env: Environment::with_chain_id(input.chain_id),
        pre: alloc.into_pre_state(),
        tx,
        post: ExpectedPostState::new().account(
            contract,
            ExpectedAccount::default().storage(U256::zero(), U256::from(3u64)),
        ),
    })
}

pub(super) fn scenario() -> Scenario {
    Scenario::new("compiled/add_and_store", ForkRange::starting(Fork::Homestead), build)
}
