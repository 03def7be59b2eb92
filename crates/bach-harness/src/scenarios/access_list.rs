//! Type-1 transaction with an access list that does not cover the slots
//! the contract reads

use super::Code;
use crate::allocator::{AccountAllocator, EOA_START_KEY};
use crate::builder::TransactionBuilder;
use crate::scenario::{Scenario, ScenarioInput, ScenarioSpec};
use crate::verifier::{ExpectedAccount, ExpectedPostState};
use crate::SetupResult;
use bach_crypto::private_key_from_bytes;
use bach_evm::Opcode;
use bach_forks::{Fork, ForkRange};
use bach_primitives::{Address, H256, U256};
use bach_types::{AccessListItem, Environment, TxType};

const SENDER_BALANCE: u64 = 0x30_0000;
const GAS_PRICE: u64 = 7;

/// 21000 + 2400 + 1900 intrinsic, two cold SLOADs plus three 2-gas ops
const GAS_USED: u64 = 29_506;

fn build(input: &ScenarioInput<'_>) -> SetupResult<ScenarioSpec> {
    let mut alloc = AccountAllocator::new();
    // PC SLOAD POP PC SLOAD: reads slots 0 and 3
    let code = Code::new()
        .op(Opcode::PC)
        .op(Opcode::SLOAD)
        .op(Opcode::POP)
        .op(Opcode::PC)
        .op(Opcode::SLOAD)
        .build();
    let contract = alloc.deploy_contract(code.clone(), U256::from(3u64), 1)?;
    let sender = alloc.fund_eoa(U256::from(SENDER_BALANCE))?;

    let tx = TransactionBuilder::call(sender.address, contract)
        .tx_type(TxType::AccessList)
        .value(U256::one())
        .gas_limit(323_328)
        .gas_price(U256::from(GAS_PRICE))
        .access_list(vec![AccessListItem {
            address: Address::ZERO,
            storage_keys: vec![H256::ZERO],
        }])
        .secret_key(private_key_from_bytes(&EOA_START_KEY)?)
        .build(&alloc, input.rules, input.chain_id)?;

    let sender_balance = U256::from(SENDER_BALANCE - 1 - GAS_USED * GAS_PRICE);
    Ok(ScenarioSpec {
        env: Environment::with_chain_id(input.chain_id),
        pre: alloc.into_pre_state(),
        tx,
        post: ExpectedPostState::new()
            .account(
                contract,
                ExpectedAccount::default()
                    .balance(U256::from(4u64))
                    .nonce(1)
                    .code(code),
            )
            .account(
                sender.address,
                ExpectedAccount::default().balance(sender_balance).nonce(1),
            ),
    })
}

pub(super) fn scenario() -> Scenario {
    Scenario::new("transactions/access_list", ForkRange::starting(Fork::Berlin), build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bach_evm::ExecutionEngine;
    use bach_forks::ForkRuleset;

    #[test]
    fn test_gas_and_balances() {
        let rules = ForkRuleset::standard().rules(Fork::Berlin);
        let spec = build(&ScenarioInput {
            fork: Fork::Berlin,
            rules: &rules,
            chain_id: 1,
        })
        .unwrap();
        let sender = spec.tx.recover_sender().unwrap();
        let result =
            ExecutionEngine::default().execute(&spec.pre, &spec.env, &spec.tx, Fork::Berlin);
        assert_eq!(result.gas_used, GAS_USED);
        // value + gas_used × gas_price
        assert_eq!(result.post_state.balance(&sender), U256::from(0x2C_D931u64));
        assert_eq!(result.post_state.nonce(&sender), 1);
    }

    #[test]
    fn test_rejected_before_berlin() {
        let rules = ForkRuleset::standard().rules(Fork::Istanbul);
        let err = build(&ScenarioInput {
            fork: Fork::Istanbul,
            rules: &rules,
            chain_id: 1,
        })
        .unwrap_err();
        assert!(matches!(err, crate::SetupError::FeatureNotActive(_)));
    }
}
