//! Transaction execution engine.
//!
//! Validates a signed transaction against the pre-state, runs it through an
//! explicit stack of interpreter frames, settles fees and produces the
//! post-state together with its diff.

use crate::context::{CallContext, CallScheme, Host, TxEnv};
use crate::error::{EvmError, EvmResult, ExecutionResult, Outcome};
use crate::frame::{
    CallInput, CreateInput, CreateScheme, Frame, FrameKind, FrameResult, FrameStatus,
    InterpreterAction,
};
use crate::gas;
use crate::interpreter::Interpreter;
use crate::journal::JournaledState;
use crate::precompile::Precompile;
use bach_crypto::keccak256;
use bach_forks::{Fork, ForkRules, ForkRuleset, Param};
use bach_primitives::{Address, H256, U256};
use bach_types::{intrinsic_gas, Environment, SignedTransaction, Transaction, TxType, WorldState};
use bytes::Bytes;
use rlp::RlpStream;
use tracing::{debug, trace};

/// Limits applied to every execution
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Abort after this many executed instructions
    pub max_steps: Option<u64>,
    /// Abort transactions whose gas limit exceeds this
    pub gas_ceiling: Option<u64>,
}

/// Executes transactions against a world state under a fork's rules
#[derive(Clone, Copy, Debug)]
pub struct ExecutionEngine<'r> {
    ruleset: &'r ForkRuleset,
    config: EngineConfig,
}

impl Default for ExecutionEngine<'static> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ExecutionEngine<'static> {
    /// Engine over the standard fork table
    pub fn new(config: EngineConfig) -> Self {
        Self {
            ruleset: ForkRuleset::standard(),
            config,
        }
    }
}

impl<'r> ExecutionEngine<'r> {
    /// Engine over a custom fork table
    pub fn with_ruleset(ruleset: &'r ForkRuleset, config: EngineConfig) -> Self {
        Self { ruleset, config }
    }

    /// Configured limits
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute `tx` on top of `pre` at `fork`.
    ///
    /// Never fails: rejected transactions come back as [`Outcome::Fatal`]
    /// and engine limits as an aborted result, both with the pre-state
    /// unchanged.
    pub fn execute(
        &self,
        pre: &WorldState,
        env: &Environment,
        tx: &SignedTransaction,
        fork: Fork,
    ) -> ExecutionResult {
        let rules = self.ruleset.rules(fork);
        debug!(hash = %tx.hash(), %fork, gas_limit = tx.tx.gas_limit(), "executing transaction");

        let validated = match validate(&rules, pre, env, tx) {
            Ok(validated) => validated,
            Err(error) => {
                debug!(hash = %tx.hash(), %error, "transaction rejected");
                return ExecutionResult::rejected(pre, error);
            }
        };

        if let Some(ceiling) = self.config.gas_ceiling {
            let limit = tx.tx.gas_limit();
            if limit > ceiling {
                let error = EvmError::GasCeilingExceeded { limit, ceiling };
                debug!(hash = %tx.hash(), %error, "execution aborted");
                return ExecutionResult::aborted(pre, error);
            }
        }

        match self.transact(&rules, pre, env, &tx.tx, validated) {
            Ok(result) => {
                debug!(
                    hash = %tx.hash(),
                    outcome = %result.outcome,
                    gas_used = result.gas_used,
                    "transaction executed"
                );
                result
            }
            Err(error) => {
                debug!(hash = %tx.hash(), %error, "execution aborted");
                ExecutionResult::aborted(pre, error)
            }
        }
    }

    fn transact(
        &self,
        rules: &ForkRules,
        pre: &WorldState,
        env: &Environment,
        tx: &Transaction,
        validated: Validated,
    ) -> EvmResult<ExecutionResult> {
        let Validated {
            sender,
            intrinsic,
            gas_price,
        } = validated;
        let gas_limit = tx.gas_limit();

        let mut state = JournaledState::new(pre.clone());
        state.sub_balance(sender, gas_price * U256::from(gas_limit))?;
        state.bump_nonce(sender);

        let created = tx.is_create().then(|| create_address(&sender, tx.nonce()));

        if rules.value(Param::ColdAccountAccess).is_some() {
            state.warm_account(sender);
            if let Some(to) = tx.to().or(created) {
                state.warm_account(to);
            }
            for precompile in Precompile::ALL {
                state.warm_account(precompile.address());
            }
            for item in tx.access_list() {
                state.warm_account(item.address);
                for key in &item.storage_keys {
                    state.warm_slot(item.address, key.to_word());
                }
            }
        }
        if rules.is_active(Param::WarmCoinbase) {
            state.warm_account(env.coinbase);
        }

        let tx_env = TxEnv {
            origin: sender,
            gas_price,
        };
        let frame_gas = gas_limit - intrinsic;
        let result = {
            let mut host = Host::new(&mut state, env, rules, &tx_env, self.config.max_steps);
            let entry = match tx.to() {
                Some(to) => start_call(
                    &mut host,
                    CallInput {
                        scheme: CallScheme::Call,
                        caller: sender,
                        address: to,
                        code_address: to,
                        value: tx.value(),
                        transfer: true,
                        input: tx.data().clone(),
                        gas_limit: frame_gas,
                        is_static: false,
                        depth: 0,
                        return_offset: 0,
                        return_size: 0,
                    },
                ),
                None => enter_create(
                    &mut host,
                    CreateInput {
                        caller: sender,
                        scheme: CreateScheme::Create,
                        value: tx.value(),
                        init_code: tx.data().clone(),
                        gas_limit: frame_gas,
                        depth: 0,
                    },
                    create_address(&sender, tx.nonce()),
                ),
            };
            let result = run_frames(&mut host, entry)?;
            trace!(steps = host.steps(), "frames finished");
            result
        };

        // Fee settlement
        let spent = gas_limit - result.gas_left;
        let quotient = rules.value_or_zero(Param::MaxRefundQuotient).max(1);
        let gas_refunded = (state.refund().max(0) as u64).min(spent / quotient);
        let gas_used = spent - gas_refunded;

        state.add_balance(sender, gas_price * U256::from(gas_limit - gas_used));
        let miner_price = if rules.is_active(Param::BaseFee) {
            gas_price.saturating_sub(env.base_fee)
        } else {
            gas_price
        };
        state.add_balance(env.coinbase, miner_price * U256::from(gas_used));
        state.touch(env.coinbase);

        let (outcome, error) = match &result.status {
            FrameStatus::Success => (Outcome::Success, None),
            FrameStatus::Revert => (Outcome::Revert, None),
            FrameStatus::Halt(EvmError::OutOfGas) => (Outcome::OutOfGas, Some(EvmError::OutOfGas)),
            FrameStatus::Halt(error) => (Outcome::InvalidOpcode, Some(error.clone())),
        };
        let contract_address = created.filter(|_| result.is_success());

        let (post_state, logs) = state.finalize(rules.is_active(Param::EmptyAccountCleanup));
        let diff = pre.diff(&post_state);
        Ok(ExecutionResult {
            outcome,
            error,
            gas_used,
            gas_refunded,
            output: result.output,
            logs,
            contract_address,
            post_state,
            diff,
            aborted: false,
        })
    }
}

// ==================== Validation ====================

struct Validated {
    sender: Address,
    intrinsic: u64,
    gas_price: U256,
}

fn validate(
    rules: &ForkRules,
    pre: &WorldState,
    env: &Environment,
    signed: &SignedTransaction,
) -> EvmResult<Validated> {
    let tx = &signed.tx;
    let fork = rules.fork();

    let type_flag = match tx.tx_type() {
        TxType::Legacy => None,
        TxType::AccessList => Some(Param::TxTypeAccessList),
        TxType::DynamicFee => Some(Param::TxTypeDynamicFee),
    };
    if let Some(flag) = type_flag {
        if !rules.is_active(flag) {
            return Err(EvmError::TxTypeNotActive {
                tx_type: tx.tx_type().envelope_byte().unwrap_or_default(),
                fork,
            });
        }
    }

    if let Some(chain_id) = tx.chain_id() {
        if tx.tx_type() == TxType::Legacy && !rules.is_active(Param::ReplayProtection) {
            return Err(EvmError::ReplayProtectionNotActive(fork));
        }
        if chain_id != env.chain_id {
            return Err(EvmError::ChainIdMismatch {
                expected: env.chain_id,
                got: chain_id,
            });
        }
    }

    let sender = signed
        .recover_sender()
        .map_err(|e| EvmError::InvalidSender(e.to_string()))?;

    let expected = pre.nonce(&sender);
    if tx.nonce() != expected {
        return Err(EvmError::NonceMismatch {
            expected,
            got: tx.nonce(),
        });
    }

    let intrinsic = intrinsic_gas(tx, rules);
    let gas_limit = tx.gas_limit();
    if intrinsic > gas_limit {
        return Err(EvmError::IntrinsicGasTooLow {
            intrinsic,
            limit: gas_limit,
        });
    }
    if gas_limit > env.gas_limit {
        return Err(EvmError::BlockGasLimitExceeded {
            limit: gas_limit,
            block: env.gas_limit,
        });
    }

    let max_fee = tx.max_fee_per_gas();
    let base_fee = if rules.is_active(Param::BaseFee) {
        if max_fee < env.base_fee {
            return Err(EvmError::FeeCapTooLow {
                max_fee,
                base_fee: env.base_fee,
            });
        }
        env.base_fee
    } else {
        U256::zero()
    };
    if let Transaction::DynamicFee(body) = tx {
        if body.max_priority_fee_per_gas > body.max_fee_per_gas {
            return Err(EvmError::TipAboveFeeCap);
        }
    }
    let gas_price = tx
        .effective_gas_price(base_fee)
        .ok_or(EvmError::FeeCapTooLow { max_fee, base_fee })?;

    if tx.is_create() {
        if let Some(limit) = rules.value(Param::MaxInitCodeSize) {
            let size = tx.data().len();
            if size as u64 > limit {
                return Err(EvmError::InitCodeTooLarge { size, limit });
            }
        }
    }

    let balance = pre.balance(&sender);
    let required = max_fee
        .checked_mul(U256::from(gas_limit))
        .and_then(|fee| fee.checked_add(tx.value()))
        .unwrap_or(U256::MAX);
    if balance < required {
        return Err(EvmError::InsufficientFunds { required, balance });
    }

    Ok(Validated {
        sender,
        intrinsic,
        gas_price,
    })
}

// ==================== Frames ====================

/// What entering a frame produced
enum Entry {
    /// A frame to run
    Frame(Frame),
    /// Finished without running code
    Done(FrameKind, FrameResult),
}

/// Drive the frame stack until the outermost frame finishes
fn run_frames(host: &mut Host<'_>, entry: Entry) -> EvmResult<FrameResult> {
    let mut current = match entry {
        Entry::Frame(frame) => frame,
        Entry::Done(_, result) => return Ok(result),
    };
    let mut parents: Vec<Frame> = Vec::new();

    loop {
        let entry = match current.interpreter.run(host) {
            InterpreterAction::Call(input) => start_call(host, input),
            InterpreterAction::Create(input) => start_create(host, input),
            InterpreterAction::Return(result) => {
                let result = finish_frame(host, &current, result);
                debug!(
                    depth = current.interpreter.context().depth,
                    status = ?result.status,
                    gas_left = result.gas_left,
                    "frame exit"
                );
                let kind = current.kind;
                match parents.pop() {
                    Some(parent) => {
                        current = parent;
                        resume(&mut current, kind, result);
                        continue;
                    }
                    None => return Ok(result),
                }
            }
            InterpreterAction::Abort => {
                return Err(EvmError::StepLimitExceeded(host.max_steps().unwrap_or_default()))
            }
        };
        match entry {
            Entry::Frame(child) => {
                debug!(depth = child.interpreter.context().depth, "frame enter");
                parents.push(std::mem::replace(&mut current, child));
            }
            Entry::Done(kind, result) => resume(&mut current, kind, result),
        }
    }
}

fn resume(parent: &mut Frame, kind: FrameKind, result: FrameResult) {
    match kind {
        FrameKind::Call {
            return_offset,
            return_size,
        } => parent
            .interpreter
            .resume_call(result, return_offset, return_size),
        FrameKind::Create { address } => parent.interpreter.resume_create(result, address),
    }
}

/// Apply code deposit for creations and revert failed frames
fn finish_frame(host: &mut Host<'_>, frame: &Frame, result: FrameResult) -> FrameResult {
    let result = match frame.kind {
        FrameKind::Create { address } if result.is_success() => {
            deposit_code(host, address, result)
        }
        _ => result,
    };
    if !result.is_success() {
        host.state.revert(frame.checkpoint);
    }
    result
}

fn deposit_code(host: &mut Host<'_>, address: Address, result: FrameResult) -> FrameResult {
    let rules = host.rules;
    let code = result.output;

    if rules.is_active(Param::RejectEfCode) && code.first() == Some(&0xEF) {
        return FrameResult::halt(EvmError::InvalidCodePrefix);
    }
    if let Some(max) = rules.value(Param::MaxCodeSize) {
        if code.len() as u64 > max {
            return FrameResult::halt(EvmError::MaxCodeSizeExceeded);
        }
    }

    let cost = gas::code_deposit_gas(rules, code.len());
    if cost > result.gas_left {
        if rules.is_active(Param::CreateDepositOogFails) {
            return FrameResult::halt(EvmError::OutOfGas);
        }
        // Frontier keeps the account but without code
        return FrameResult::success(result.gas_left, Bytes::new());
    }
    host.state.set_code(address, code.clone());
    FrameResult::success(result.gas_left - cost, code)
}

fn depth_exceeded(rules: &ForkRules, depth: usize) -> bool {
    depth as u64 > rules.value_or_zero(Param::CallDepthLimit)
}

fn start_call(host: &mut Host<'_>, input: CallInput) -> Entry {
    let kind = FrameKind::Call {
        return_offset: input.return_offset,
        return_size: input.return_size,
    };
    let rules = host.rules;

    if depth_exceeded(rules, input.depth)
        || (input.transfer && host.state.balance(&input.caller) < input.value)
    {
        return Entry::Done(kind, FrameResult::revert(input.gas_limit, Bytes::new()));
    }

    let checkpoint = host.state.checkpoint();
    let precompile = Precompile::at(&input.code_address);

    if !host.state.exists(&input.address) {
        if rules.is_active(Param::EmptyAccountCleanup)
            && input.value.is_zero()
            && precompile.is_none()
        {
            return Entry::Done(kind, FrameResult::success(input.gas_limit, Bytes::new()));
        }
        host.state.load_or_create(input.address);
    }

    if input.transfer {
        if let Err(error) = host
            .state
            .transfer(input.caller, input.address, input.value)
        {
            trace!(%error, "call transfer failed");
            host.state.revert(checkpoint);
            return Entry::Done(kind, FrameResult::revert(input.gas_limit, Bytes::new()));
        }
    } else {
        host.state.touch(input.address);
    }

    if let Some(precompile) = precompile {
        return match precompile.run(&input.input, input.gas_limit) {
            Ok(out) => Entry::Done(
                kind,
                FrameResult::success(input.gas_limit - out.gas_used, out.output),
            ),
            Err(error) => {
                host.state.revert(checkpoint);
                Entry::Done(kind, FrameResult::halt(error))
            }
        };
    }

    let code = host.state.code(&input.code_address);
    if code.is_empty() {
        return Entry::Done(kind, FrameResult::success(input.gas_limit, Bytes::new()));
    }

    let context = CallContext {
        address: input.address,
        caller: input.caller,
        code_address: input.code_address,
        value: input.value,
        input: input.input,
        is_static: input.is_static,
        depth: input.depth,
    };
    Entry::Frame(Frame {
        interpreter: Interpreter::new(context, code, input.gas_limit),
        kind,
        checkpoint,
    })
}

fn start_create(host: &mut Host<'_>, input: CreateInput) -> Entry {
    let rejected = FrameKind::Create {
        address: Address::ZERO,
    };
    let nonce = host.state.nonce(&input.caller);
    if depth_exceeded(host.rules, input.depth)
        || host.state.balance(&input.caller) < input.value
        || nonce == u64::MAX
    {
        return Entry::Done(rejected, FrameResult::revert(input.gas_limit, Bytes::new()));
    }
    host.state.bump_nonce(input.caller);

    let address = match input.scheme {
        CreateScheme::Create => create_address(&input.caller, nonce),
        CreateScheme::Create2 { salt } => create2_address(&input.caller, salt, &input.init_code),
    };
    enter_create(host, input, address)
}

fn enter_create(host: &mut Host<'_>, input: CreateInput, address: Address) -> Entry {
    let kind = FrameKind::Create { address };
    let rules = host.rules;

    if rules.value(Param::ColdAccountAccess).is_some() {
        host.state.warm_account(address);
    }
    if host
        .state
        .account(&address)
        .is_some_and(|account| account.nonce != 0 || account.has_code())
    {
        return Entry::Done(kind, FrameResult::halt(EvmError::CreateCollision));
    }

    let checkpoint = host.state.checkpoint();
    let nonce = u64::from(rules.is_active(Param::EmptyAccountCleanup));
    host.state.create_account(address, nonce);
    if let Err(error) = host.state.transfer(input.caller, address, input.value) {
        trace!(%error, "create endowment failed");
        host.state.revert(checkpoint);
        return Entry::Done(kind, FrameResult::revert(input.gas_limit, Bytes::new()));
    }

    if input.init_code.is_empty() {
        return Entry::Done(kind, FrameResult::success(input.gas_limit, Bytes::new()));
    }

    let context = CallContext {
        address,
        caller: input.caller,
        code_address: address,
        value: input.value,
        input: Bytes::new(),
        is_static: false,
        depth: input.depth,
    };
    Entry::Frame(Frame {
        interpreter: Interpreter::new(context, input.init_code, input.gas_limit),
        kind,
        checkpoint,
    })
}

// ==================== Addresses ====================

fn address_from_hash(hash: H256) -> Address {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(bytes)
}

/// CREATE address: keccak256(rlp([sender, nonce]))[12..]
pub fn create_address(sender: &Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(sender);
    stream.append(&nonce);
    address_from_hash(keccak256(&stream.out()))
}

/// CREATE2 address: keccak256(0xff ‖ sender ‖ salt ‖ keccak256(init_code))[12..]
pub fn create2_address(sender: &Address, salt: U256, init_code: &[u8]) -> Address {
    let mut buf = Vec::with_capacity(85);
    buf.push(0xff);
    buf.extend_from_slice(sender.as_bytes());
    buf.extend_from_slice(H256::from_word(salt).as_bytes());
    buf.extend_from_slice(keccak256(init_code).as_bytes());
    address_from_hash(keccak256(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bach_crypto::{private_key_from_hex, private_key_to_address, PrivateKey};
    use bach_types::{Account, AccessListItem, AccessListTx, DynamicFeeTx, LegacyTx};

    const KEY: &str = "0x45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8";
    const ETHER: u128 = 1_000_000_000_000_000_000;

    fn key() -> PrivateKey {
        private_key_from_hex(KEY).unwrap()
    }

    fn sender() -> Address {
        private_key_to_address(&key())
    }

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn funded(balance: U256) -> WorldState {
        let mut pre = WorldState::new();
        pre.insert(sender(), Account::with_balance(balance));
        pre
    }

    fn legacy(to: Option<Address>, data: &[u8], gas_limit: u64) -> SignedTransaction {
        Transaction::Legacy(LegacyTx {
            gas_price: U256::from(10),
            gas_limit,
            to,
            data: Bytes::copy_from_slice(data),
            ..Default::default()
        })
        .sign(&key())
        .unwrap()
    }

    fn execute(pre: &WorldState, tx: &SignedTransaction, fork: Fork) -> ExecutionResult {
        ExecutionEngine::default().execute(pre, &Environment::default(), tx, fork)
    }

    fn with_contract(code: &[u8]) -> WorldState {
        let mut pre = funded(U256::from(ETHER));
        pre.insert(addr(0x1000), Account::with_code(Bytes::copy_from_slice(code), U256::zero(), 1));
        pre
    }

    // ==================== Address derivation ====================

    #[test]
    fn test_create_address() {
        let sender = Address::from_hex("0x6ac7ea33f8831ea9dcc53393aaa88b25a785dbf0").unwrap();
        assert_eq!(
            create_address(&sender, 0).to_hex(),
            "0xcd234a471b72ba2f1ccf0a70fcaba648a5eecd8d"
        );
        assert_eq!(
            create_address(&sender, 1).to_hex(),
            "0x343c43a37d37dff08ae8c4a11544c718abb4fcf8"
        );
    }

    #[test]
    fn test_create2_address() {
        let address = create2_address(&Address::ZERO, U256::zero(), &[0x00]);
        assert_eq!(address.to_hex(), "0x4d1a2e2bb4f88f0250f26ffff098b0b30b26bf38");
    }

    // ==================== Value transfer ====================

    #[test]
    fn test_value_transfer() {
        let pre = funded(U256::from(ETHER));
        let tx = Transaction::Legacy(LegacyTx {
            gas_price: U256::from(10),
            to: Some(addr(0x2000)),
            value: U256::from(1000),
            ..Default::default()
        })
        .sign(&key())
        .unwrap();

        let result = execute(&pre, &tx, Fork::Cancun);
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.gas_used, 21000);
        let post = &result.post_state;
        assert_eq!(post.balance(&addr(0x2000)), U256::from(1000));
        assert_eq!(
            post.balance(&sender()),
            U256::from(ETHER) - U256::from(1000) - U256::from(210_000)
        );
        assert_eq!(post.nonce(&sender()), 1);
        // priority fee only: 10 - 7
        let coinbase = Environment::default().coinbase;
        assert_eq!(post.balance(&coinbase), U256::from(63_000));
        assert_eq!(result.diff.changes.len(), 3);
    }

    #[test]
    fn test_zero_value_call_to_nothing_creates_nothing() {
        let pre = funded(U256::from(ETHER));
        let result = execute(&pre, &legacy(Some(addr(0x2000)), &[], 21000), Fork::Cancun);
        assert!(result.is_success());
        assert!(!result.post_state.contains(&addr(0x2000)));
    }

    // ==================== Access lists ====================

    fn access_list_tx(access_list: Vec<AccessListItem>) -> SignedTransaction {
        Transaction::AccessList(AccessListTx {
            chain_id: 1,
            nonce: 0,
            gas_price: U256::from(7),
            gas_limit: 323_328,
            to: Some(addr(0x1000)),
            value: U256::one(),
            data: Bytes::new(),
            access_list,
        })
        .sign(&key())
        .unwrap()
    }

    fn access_list_pre() -> WorldState {
        let mut pre = funded(U256::from(0x300000));
        // PC SLOAD POP PC SLOAD
        pre.insert(
            addr(0x1000),
            Account::with_code(Bytes::from_static(&[0x58, 0x54, 0x50, 0x58, 0x54]), U256::from(3), 1),
        );
        pre
    }

    #[test]
    fn test_access_list_for_other_account_leaves_slots_cold() {
        let tx = access_list_tx(vec![AccessListItem {
            address: Address::ZERO,
            storage_keys: vec![H256::ZERO],
        }]);
        let result = execute(&access_list_pre(), &tx, Fork::Berlin);
        assert_eq!(result.outcome, Outcome::Success);
        // 21000 + 2400 + 1900 intrinsic, 2 + 2100 + 2 + 2 + 2100 execution
        assert_eq!(result.gas_used, 29_506);
        let post = &result.post_state;
        assert_eq!(post.balance(&sender()), U256::from(0x2CD931));
        assert_eq!(post.nonce(&sender()), 1);
        assert_eq!(post.balance(&addr(0x1000)), U256::from(4));
        assert_eq!(post.nonce(&addr(0x1000)), 1);
    }

    #[test]
    fn test_access_list_prewarms_slot() {
        let tx = access_list_tx(vec![AccessListItem {
            address: addr(0x1000),
            storage_keys: vec![H256::ZERO],
        }]);
        let result = execute(&access_list_pre(), &tx, Fork::Berlin);
        // slot 0 warm (100), slot 3 still cold (2100)
        assert_eq!(result.gas_used, 25_300 + 2 + 100 + 2 + 2 + 2100);
    }

    #[test]
    fn test_access_list_rejected_before_berlin() {
        let tx = access_list_tx(Vec::new());
        let result = execute(&access_list_pre(), &tx, Fork::Istanbul);
        assert_eq!(result.outcome, Outcome::Fatal);
        assert!(matches!(result.error, Some(EvmError::TxTypeNotActive { tx_type: 1, .. })));
        assert_eq!(result.post_state, access_list_pre());
    }

    // ==================== Nested calls ====================

    // SSTORE(0, CALL(gas, 0x1100, 0, 0, 0, 0, 0))
    fn caller_code(gas: u16) -> Vec<u8> {
        let [hi, lo] = gas.to_be_bytes();
        vec![
            0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x61, 0x11, 0x00, 0x61,
            hi, lo, 0xf1, 0x60, 0x00, 0x55,
        ]
    }

    // opcode(GAS, 0xfeff..ff, 1, 0, 0, 0, 0)
    fn callee_code(opcode: u8) -> Vec<u8> {
        let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x01, 0x73, 0xfe];
        code.extend_from_slice(&[0xff; 19]);
        code.extend_from_slice(&[0x5a, opcode]);
        code
    }

    fn stipend_flag(opcode: u8, gas: u16, fork: Fork) -> U256 {
        let mut pre = funded(U256::from(0x0BA1A9CEu64));
        pre.insert(addr(0x1000), Account::with_code(Bytes::from(caller_code(gas)), U256::from(3), 1));
        pre.insert(addr(0x1100), Account::with_code(Bytes::from(callee_code(opcode)), U256::from(3), 1));
        let tx = Transaction::Legacy(LegacyTx {
            gas_price: U256::from(10),
            gas_limit: 500_000,
            to: Some(addr(0x1000)),
            value: U256::one(),
            chain_id: Some(1),
            ..Default::default()
        })
        .sign(&key())
        .unwrap();
        let result = execute(&pre, &tx, fork);
        assert_eq!(result.outcome, Outcome::Success);
        result.post_state.storage(&addr(0x1000), &U256::zero())
    }

    #[test]
    fn test_call_stipend_goes_to_child_frame() {
        for fork in [Fork::London, Fork::Paris] {
            assert_eq!(stipend_flag(0xf1, 36_620, fork), U256::one());
            assert_eq!(stipend_flag(0xf1, 36_619, fork), U256::zero());
        }
    }

    #[test]
    fn test_callcode_stipend_goes_to_child_frame() {
        for fork in [Fork::London, Fork::Paris] {
            assert_eq!(stipend_flag(0xf2, 11_620, fork), U256::one());
            assert_eq!(stipend_flag(0xf2, 11_619, fork), U256::zero());
        }
    }

    // opcode(0, 0x2000, 0, 0, 0, 0, 0) POP BALANCE(target) POP STOP
    fn warm_probe(opcode: u8, target: u16) -> u64 {
        let [hi, lo] = target.to_be_bytes();
        let code = [
            0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x61, 0x20, 0x00, 0x60,
            0x00, opcode, 0x50, 0x61, hi, lo, 0x31, 0x50, 0x00,
        ];
        let result = execute(&with_contract(&code), &legacy(Some(addr(0x1000)), &[], 100_000), Fork::Cancun);
        assert_eq!(result.outcome, Outcome::Success);
        result.gas_used
    }

    #[test]
    fn test_callcode_warms_target_like_call() {
        let call = warm_probe(0xf1, 0x2000);
        assert_eq!(warm_probe(0xf2, 0x2000), call);
        // untouched address stays cold: 2600 instead of 100
        assert_eq!(warm_probe(0xf2, 0x3000), call + 2500);
        assert_eq!(warm_probe(0xf1, 0x3000), call + 2500);
    }

    #[test]
    fn test_failed_child_changes_are_discarded() {
        // callee: SSTORE(0, 1) then INVALID
        let mut pre = funded(U256::from(ETHER));
        pre.insert(addr(0x1000), Account::with_code(Bytes::from(caller_code(50_000)), U256::zero(), 1));
        pre.insert(
            addr(0x1100),
            Account::with_code(Bytes::from_static(&[0x60, 0x01, 0x60, 0x00, 0x55, 0xfe]), U256::zero(), 1),
        );
        let result = execute(&pre, &legacy(Some(addr(0x1000)), &[], 200_000), Fork::Cancun);
        assert_eq!(result.outcome, Outcome::Success);
        assert_eq!(result.post_state.storage(&addr(0x1100), &U256::zero()), U256::zero());
        assert_eq!(result.post_state.storage(&addr(0x1000), &U256::zero()), U256::zero());
    }

    // ==================== Top-level outcomes ====================

    #[test]
    fn test_top_level_revert() {
        // SSTORE(0, 1), REVERT(0, 0)
        let pre = with_contract(&[0x60, 0x01, 0x60, 0x00, 0x55, 0x60, 0x00, 0x60, 0x00, 0xfd]);
        let result = execute(&pre, &legacy(Some(addr(0x1000)), &[], 100_000), Fork::Cancun);
        assert_eq!(result.outcome, Outcome::Revert);
        assert_eq!(result.gas_used, 21_000 + 3 + 3 + 22_100 + 3 + 3);
        assert_eq!(result.post_state.storage(&addr(0x1000), &U256::zero()), U256::zero());
        assert_eq!(result.post_state.nonce(&sender()), 1);
    }

    #[test]
    fn test_top_level_out_of_gas() {
        // JUMPDEST, PUSH1 0, JUMP
        let pre = with_contract(&[0x5b, 0x60, 0x00, 0x56]);
        let result = execute(&pre, &legacy(Some(addr(0x1000)), &[], 50_000), Fork::Cancun);
        assert_eq!(result.outcome, Outcome::OutOfGas);
        assert_eq!(result.gas_used, 50_000);
        assert!(!result.aborted);
        assert_eq!(
            result.post_state.balance(&sender()),
            U256::from(ETHER) - U256::from(500_000)
        );
    }

    #[test]
    fn test_top_level_invalid_opcode() {
        let pre = with_contract(&[0xfe]);
        let result = execute(&pre, &legacy(Some(addr(0x1000)), &[], 50_000), Fork::Cancun);
        assert_eq!(result.outcome, Outcome::InvalidOpcode);
        assert_eq!(result.error, Some(EvmError::InvalidOpcode(0xfe)));
        assert_eq!(result.gas_used, 50_000);
    }

    #[test]
    fn test_sstore_clear_refund() {
        // SSTORE(0, 0) on a slot holding 1
        let mut pre = with_contract(&[0x60, 0x00, 0x60, 0x00, 0x55]);
        pre.get_mut(&addr(0x1000)).unwrap().storage_set(U256::zero(), U256::one());
        let result = execute(&pre, &legacy(Some(addr(0x1000)), &[], 100_000), Fork::Cancun);
        assert!(result.is_success());
        // cold 2100 + reset 2900, refund 4800 within the 1/5 cap
        assert_eq!(result.gas_refunded, 4800);
        assert_eq!(result.gas_used, 21_000 + 6 + 5000 - 4800);
    }

    #[test]
    fn test_logs_kept_on_success() {
        // LOG0(0, 0)
        let pre = with_contract(&[0x60, 0x00, 0x60, 0x00, 0xa0]);
        let result = execute(&pre, &legacy(Some(addr(0x1000)), &[], 100_000), Fork::Cancun);
        assert_eq!(result.logs.len(), 1);
        assert_eq!(result.logs[0].address, addr(0x1000));
    }

    // ==================== Creation ====================

    #[test]
    fn test_create_transaction_deploys_code() {
        // MSTORE8(0, 0x00), RETURN(0, 1)
        let init = [0x60, 0x00, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3];
        let pre = funded(U256::from(ETHER));
        let result = execute(&pre, &legacy(None, &init, 100_000), Fork::Cancun);
        assert!(result.is_success());
        let address = create_address(&sender(), 0);
        assert_eq!(result.contract_address, Some(address));
        let account = result.post_state.get(&address).unwrap();
        assert_eq!(account.code.as_ref(), &[0x00]);
        assert_eq!(account.nonce, 1);
    }

    #[test]
    fn test_create_rejects_ef_prefix_from_london() {
        // MSTORE8(0, 0xef), RETURN(0, 1)
        let init = [0x60, 0xef, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3];
        let pre = funded(U256::from(ETHER));
        let result = execute(&pre, &legacy(None, &init, 100_000), Fork::London);
        assert_eq!(result.outcome, Outcome::InvalidOpcode);
        assert_eq!(result.error, Some(EvmError::InvalidCodePrefix));
        assert_eq!(result.contract_address, None);

        let result = execute(&pre, &legacy(None, &init, 100_000), Fork::Berlin);
        assert!(result.is_success());
    }

    #[test]
    fn test_create_opcode() {
        // CREATE(0, 0, 0) then SSTORE(0, address)
        let pre = with_contract(&[0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0xf0, 0x60, 0x00, 0x55]);
        let result = execute(&pre, &legacy(Some(addr(0x1000)), &[], 200_000), Fork::Cancun);
        assert!(result.is_success());
        let child = create_address(&addr(0x1000), 1);
        assert_eq!(
            result.post_state.storage(&addr(0x1000), &U256::zero()),
            child.to_word()
        );
        assert_eq!(result.post_state.nonce(&addr(0x1000)), 2);
        assert_eq!(result.post_state.nonce(&child), 1);
    }

    // ==================== Rejection ====================

    #[test]
    fn test_intrinsic_gas_too_low() {
        let pre = funded(U256::from(ETHER));
        let result = execute(&pre, &legacy(Some(addr(0x2000)), &[], 20_000), Fork::Cancun);
        assert_eq!(result.outcome, Outcome::Fatal);
        assert_eq!(
            result.error,
            Some(EvmError::IntrinsicGasTooLow {
                intrinsic: 21_000,
                limit: 20_000
            })
        );
        assert_eq!(result.post_state, pre);
        assert!(result.diff.is_empty());
    }

    #[test]
    fn test_nonce_mismatch() {
        let mut pre = funded(U256::from(ETHER));
        pre.get_mut(&sender()).unwrap().nonce = 3;
        let result = execute(&pre, &legacy(Some(addr(0x2000)), &[], 21_000), Fork::Cancun);
        assert_eq!(result.error, Some(EvmError::NonceMismatch { expected: 3, got: 0 }));
    }

    #[test]
    fn test_chain_id_mismatch() {
        let pre = funded(U256::from(ETHER));
        let tx = Transaction::Legacy(LegacyTx {
            gas_price: U256::from(10),
            to: Some(addr(0x2000)),
            chain_id: Some(5),
            ..Default::default()
        })
        .sign(&key())
        .unwrap();
        let result = execute(&pre, &tx, Fork::Cancun);
        assert_eq!(result.error, Some(EvmError::ChainIdMismatch { expected: 1, got: 5 }));
        let result = execute(&pre, &tx, Fork::Homestead);
        assert_eq!(result.error, Some(EvmError::ReplayProtectionNotActive(Fork::Homestead)));
    }

    #[test]
    fn test_fee_cap_below_base_fee() {
        let pre = funded(U256::from(ETHER));
        let tx = Transaction::DynamicFee(DynamicFeeTx {
            chain_id: 1,
            nonce: 0,
            max_priority_fee_per_gas: U256::one(),
            max_fee_per_gas: U256::from(6),
            gas_limit: 21_000,
            to: Some(addr(0x2000)),
            value: U256::zero(),
            data: Bytes::new(),
            access_list: Vec::new(),
        })
        .sign(&key())
        .unwrap();
        let result = execute(&pre, &tx, Fork::London);
        assert_eq!(
            result.error,
            Some(EvmError::FeeCapTooLow {
                max_fee: U256::from(6),
                base_fee: U256::from(7)
            })
        );
    }

    #[test]
    fn test_insufficient_funds() {
        let pre = funded(U256::from(1000));
        let result = execute(&pre, &legacy(Some(addr(0x2000)), &[], 21_000), Fork::Cancun);
        assert!(matches!(result.error, Some(EvmError::InsufficientFunds { .. })));
        assert_eq!(result.outcome, Outcome::Fatal);
    }

    // ==================== Engine limits ====================

    #[test]
    fn test_step_limit_aborts() {
        let pre = with_contract(&[0x5b, 0x60, 0x00, 0x56]);
        let engine = ExecutionEngine::new(EngineConfig {
            max_steps: Some(1000),
            gas_ceiling: None,
        });
        let tx = legacy(Some(addr(0x1000)), &[], 10_000_000);
        let result = engine.execute(&pre, &Environment::default(), &tx, Fork::Cancun);
        assert!(result.aborted);
        assert_eq!(result.outcome, Outcome::OutOfGas);
        assert_eq!(result.error, Some(EvmError::StepLimitExceeded(1000)));
        assert_eq!(result.post_state, pre);
    }

    #[test]
    fn test_gas_ceiling_aborts() {
        let pre = funded(U256::from(ETHER));
        let engine = ExecutionEngine::new(EngineConfig {
            max_steps: None,
            gas_ceiling: Some(100_000),
        });
        let tx = legacy(Some(addr(0x2000)), &[], 200_000);
        let result = engine.execute(&pre, &Environment::default(), &tx, Fork::Cancun);
        assert!(result.aborted);
        assert_eq!(result.post_state, pre);
    }
}
