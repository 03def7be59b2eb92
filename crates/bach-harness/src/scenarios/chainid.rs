//! CHAINID reports the configured chain id

use super::Code;
use crate::allocator::AccountAllocator;
use crate::builder::TransactionBuilder;
use crate::scenario::{Scenario, ScenarioInput, ScenarioSpec};
use crate::verifier::{ExpectedAccount, ExpectedPostState};
use crate::SetupResult;
use bach_evm::Opcode;
use bach_forks::{Fork, ForkRange};
use bach_primitives::U256;
use bach_types::{Environment, DEFAULT_COINBASE};

fn build(input: &ScenarioInput<'_>) -> SetupResult<ScenarioSpec> {
    let env = Environment {
        coinbase: DEFAULT_COINBASE,
        difficulty: U256::from(0x20000u64),
        gas_limit: 10_000_000,
        number: 1,
        timestamp: 1000,
        ..Environment::with_chain_id(input.chain_id)
    };

    let mut alloc = AccountAllocator::new();
    let code = Code::new()
        .op(Opcode::CHAINID)
        .push(1u64)
        .op(Opcode::SSTORE)
        .op(Opcode::STOP)
        .build();
    let contract = alloc.deploy_contract(code, U256::zero(), 0)?;
    let sender = alloc.fund_eoa(U256::from(1_000_000_000_000_000_000u64))?;
    let tx = TransactionBuilder::call(sender.address, contract)
        .gas_limit(100_000)
        .build(&alloc, input.rules, input.chain_id)?;

    Ok(ScenarioSpec {
        env,
        pre: alloc.into_pre_state(),
        tx,
        post: ExpectedPostState::new().account(
            contract,
            ExpectedAccount::default().storage(U256::one(), U256::from(input.chain_id)),
        ),
    })
}

pub(super) fn scenario() -> Scenario {
    Scenario::new("env/chainid", ForkRange::starting(Fork::Istanbul), build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bach_evm::ExecutionEngine;
    use bach_forks::ForkRuleset;

    #[test]
    fn test_chainid_stored() {
        for chain_id in [1u64, 1337] {
            let rules = ForkRuleset::standard().rules(Fork::Shanghai);
            let spec = build(&ScenarioInput {
                fork: Fork::Shanghai,
                rules: &rules,
                chain_id,
            })
            .unwrap();
            let result =
                ExecutionEngine::default().execute(&spec.pre, &spec.env, &spec.tx, Fork::Shanghai);
            let contract = bach_primitives::Address::from_low_u64_be(0x1000);
            assert_eq!(result.post_state.storage(&contract, &U256::one()), U256::from(chain_id));
        }
    }

    #[test]
    fn test_not_scheduled_before_istanbul() {
        let scenario = scenario();
        assert!(!scenario.applies_to(Fork::ConstantinopleFix));
        assert!(scenario.applies_to(Fork::Istanbul));
    }
}
