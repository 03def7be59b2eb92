//! EVM bytecode interpreter.
//!
//! An [`Interpreter`] runs one frame until it finishes or needs a child
//! frame; nested calls are driven by the engine's frame stack, never by
//! recursion here.

use crate::arith;
use crate::context::{CallContext, CallScheme, Host};
use crate::error::{EvmError, EvmResult, Log};
use crate::frame::{CallInput, CreateInput, CreateScheme, FrameResult, FrameStatus, InterpreterAction};
use crate::gas;
use crate::memory::Memory;
use crate::opcode::Opcode;
use crate::stack::Stack;
use bach_crypto::keccak256;
use bach_forks::{ForkRules, Param};
use bach_primitives::{Address, H256, U256};
use bytes::Bytes;
use std::collections::HashSet;
use tracing::trace;

// Upper bound on any memory offset or length the gas schedule can pay for
const MEMORY_LIMIT: u64 = u32::MAX as u64;

enum Control {
    Continue,
    Stop,
    Return(Bytes),
    Revert(Bytes),
    Call(CallInput),
    Create(CreateInput),
}

/// Interpreter state
#[derive(Clone, Debug)]
pub struct Interpreter {
    /// Frame context
    context: CallContext,
    /// Bytecode being executed
    code: Bytes,
    /// Program counter
    pc: usize,
    /// Stack
    stack: Stack,
    /// Memory
    memory: Memory,
    /// Return data from last call
    return_data: Bytes,
    /// Gas remaining
    gas: u64,
    /// Valid jump destinations
    jump_dests: HashSet<usize>,
}

impl Interpreter {
    /// Create a new interpreter with bytecode and gas
    pub fn new(context: CallContext, code: Bytes, gas: u64) -> Self {
        let jump_dests = Self::analyze_jump_dests(&code);
        Self {
            context,
            code,
            pc: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            return_data: Bytes::new(),
            gas,
            jump_dests,
        }
    }

    /// Analyze bytecode for valid jump destinations
    fn analyze_jump_dests(code: &[u8]) -> HashSet<usize> {
        let mut dests = HashSet::new();
        let mut i = 0;

        while i < code.len() {
            let opcode = code[i];
            if opcode == Opcode::JUMPDEST as u8 {
                dests.insert(i);
            }
            // Skip PUSH operands
            if (0x60..=0x7F).contains(&opcode) {
                i += (opcode - 0x5F) as usize;
            }
            i += 1;
        }

        dests
    }

    /// Frame context
    pub fn context(&self) -> &CallContext {
        &self.context
    }

    /// Get remaining gas
    pub fn gas_remaining(&self) -> u64 {
        self.gas
    }

    /// Get return data of the last child frame
    pub fn return_data(&self) -> &[u8] {
        &self.return_data
    }

    /// Execute until the frame finishes or needs a child frame
    pub fn run(&mut self, host: &mut Host<'_>) -> InterpreterAction {
        loop {
            if !host.tick() {
                return InterpreterAction::Abort;
            }
            let control = match self.step(host) {
                Ok(control) => control,
                Err(error) => {
                    trace!(pc = self.pc, %error, depth = self.context.depth, "frame halted");
                    return InterpreterAction::Return(FrameResult::halt(error));
                }
            };
            match control {
                Control::Continue => {}
                Control::Stop => {
                    return InterpreterAction::Return(FrameResult::success(self.gas, Bytes::new()))
                }
                Control::Return(output) => {
                    return InterpreterAction::Return(FrameResult::success(self.gas, output))
                }
                Control::Revert(output) => {
                    return InterpreterAction::Return(FrameResult::revert(self.gas, output))
                }
                Control::Call(input) => return InterpreterAction::Call(input),
                Control::Create(input) => return InterpreterAction::Create(input),
            }
        }
    }

    /// Continue after a child call frame finished
    pub fn resume_call(&mut self, result: FrameResult, return_offset: usize, return_size: usize) {
        self.gas += result.gas_left;
        let success = result.is_success();
        if !matches!(result.status, FrameStatus::Halt(_)) {
            let copied = return_size.min(result.output.len());
            self.memory
                .store_slice(return_offset, &result.output[..copied]);
        }
        self.return_data = result.output;
        // Room for the result was reserved when the call popped its operands
        let _ = self.stack.push_bool(success);
    }

    /// Continue after a child creation frame finished
    pub fn resume_create(&mut self, result: FrameResult, address: Address) {
        self.gas += result.gas_left;
        let pushed = match result.status {
            FrameStatus::Success => {
                self.return_data = Bytes::new();
                address.to_word()
            }
            FrameStatus::Revert => {
                self.return_data = result.output;
                U256::zero()
            }
            FrameStatus::Halt(_) => {
                self.return_data = Bytes::new();
                U256::zero()
            }
        };
        let _ = self.stack.push(pushed);
    }

    /// Execute a single instruction
    fn step(&mut self, host: &mut Host<'_>) -> EvmResult<Control> {
        let Some(&byte) = self.code.get(self.pc) else {
            return Ok(Control::Stop);
        };
        let static_gas = host
            .rules
            .opcode_gas(byte)
            .ok_or(EvmError::InvalidOpcode(byte))?;
        let opcode = Opcode::from_byte(byte).ok_or(EvmError::InvalidOpcode(byte))?;
        self.use_gas(static_gas)?;
        self.pc += 1;
        self.execute(opcode, host)
    }

    /// Use gas, returning error if insufficient
    fn use_gas(&mut self, amount: u64) -> EvmResult<()> {
        if self.gas < amount {
            return Err(EvmError::OutOfGas);
        }
        self.gas -= amount;
        Ok(())
    }

    /// Charge for and perform memory expansion covering `offset..offset+size`
    fn memory_range(&mut self, rules: &ForkRules, offset: U256, size: U256) -> EvmResult<(usize, usize)> {
        if size.is_zero() {
            return Ok((0, 0));
        }
        let limit = U256::from(MEMORY_LIMIT);
        if offset > limit || size > limit {
            return Err(EvmError::OutOfGas);
        }
        let (offset, size) = (offset.low_u64(), size.low_u64());
        let new_words = (offset + size).div_ceil(32);
        let current_words = self.memory.words() as u64;
        self.use_gas(gas::memory_gas(rules, current_words, new_words))?;
        self.memory.resize_words(new_words as usize);
        Ok((offset as usize, size as usize))
    }

    /// EIP-2929 account access surcharge
    fn access_account(&mut self, host: &mut Host<'_>, address: Address) -> EvmResult<()> {
        if host.rules.value(Param::ColdAccountAccess).is_some() {
            let cold = host.state.warm_account(address);
            self.use_gas(gas::account_access_gas(host.rules, cold))?;
        }
        Ok(())
    }

    fn require_non_static(&self) -> EvmResult<()> {
        if self.context.is_static {
            return Err(EvmError::StaticCallViolation);
        }
        Ok(())
    }

    fn jump(&mut self, dest: U256) -> EvmResult<()> {
        let dest = arith::as_usize_saturated(dest);
        if !self.jump_dests.contains(&dest) {
            return Err(EvmError::InvalidJump(dest));
        }
        self.pc = dest;
        Ok(())
    }

    /// Execute an opcode
    fn execute(&mut self, opcode: Opcode, host: &mut Host<'_>) -> EvmResult<Control> {
        let rules = host.rules;
        match opcode {
            // Stop
            Opcode::STOP => return Ok(Control::Stop),

            // Arithmetic
            Opcode::ADD => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a.overflowing_add(b).0)?;
            }
            Opcode::MUL => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a.overflowing_mul(b).0)?;
            }
            Opcode::SUB => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a.overflowing_sub(b).0)?;
            }
            Opcode::DIV => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(arith::div(a, b))?;
            }
            Opcode::SDIV => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(arith::sdiv(a, b))?;
            }
            Opcode::MOD => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(arith::rem(a, b))?;
            }
            Opcode::SMOD => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(arith::smod(a, b))?;
            }
            Opcode::ADDMOD => {
                let [a, b, n] = self.stack.pop_n()?;
                self.stack.push(arith::addmod(a, b, n))?;
            }
            Opcode::MULMOD => {
                let [a, b, n] = self.stack.pop_n()?;
                self.stack.push(arith::mulmod(a, b, n))?;
            }
            Opcode::EXP => {
                let [base, exponent] = self.stack.pop_n()?;
                self.use_gas(gas::exp_gas(rules, exponent))?;
                self.stack.push(arith::exp(base, exponent))?;
            }
            Opcode::SIGNEXTEND => {
                let [b, x] = self.stack.pop_n()?;
                self.stack.push(arith::signextend(b, x))?;
            }

            // Comparison & Bitwise Logic
            Opcode::LT => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(a < b)?;
            }
            Opcode::GT => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(a > b)?;
            }
            Opcode::SLT => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(arith::slt(a, b))?;
            }
            Opcode::SGT => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(arith::sgt(a, b))?;
            }
            Opcode::EQ => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(a == b)?;
            }
            Opcode::ISZERO => {
                let a = self.stack.pop()?;
                self.stack.push_bool(a.is_zero())?;
            }
            Opcode::AND => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a & b)?;
            }
            Opcode::OR => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a | b)?;
            }
            Opcode::XOR => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a ^ b)?;
            }
            Opcode::NOT => {
                let a = self.stack.pop()?;
                self.stack.push(!a)?;
            }
            Opcode::BYTE => {
                let [i, x] = self.stack.pop_n()?;
                self.stack.push(arith::byte(i, x))?;
            }
            Opcode::SHL => {
                let [shift, value] = self.stack.pop_n()?;
                self.stack.push(arith::shl(shift, value))?;
            }
            Opcode::SHR => {
                let [shift, value] = self.stack.pop_n()?;
                self.stack.push(arith::shr(shift, value))?;
            }
            Opcode::SAR => {
                let [shift, value] = self.stack.pop_n()?;
                self.stack.push(arith::sar(shift, value))?;
            }

            // SHA3
            Opcode::KECCAK256 => {
                let [offset, size] = self.stack.pop_n()?;
                let (offset, size) = self.memory_range(rules, offset, size)?;
                self.use_gas(gas::keccak_word_gas(rules, size))?;
                let hash = keccak256(self.memory.slice(offset, size));
                self.stack.push(hash.to_word())?;
            }

            // Environmental Information
            Opcode::ADDRESS => self.stack.push(self.context.address.to_word())?,
            Opcode::BALANCE => {
                let address = Address::from_word(self.stack.pop()?);
                self.access_account(host, address)?;
                self.stack.push(host.state.balance(&address))?;
            }
            Opcode::ORIGIN => self.stack.push(host.tx.origin.to_word())?,
            Opcode::CALLER => self.stack.push(self.context.caller.to_word())?,
            Opcode::CALLVALUE => self.stack.push(self.context.value)?,
            Opcode::CALLDATALOAD => {
                let offset = arith::as_usize_saturated(self.stack.pop()?);
                let mut word = [0u8; 32];
                let input = &self.context.input;
                if offset < input.len() {
                    let end = (offset + 32).min(input.len());
                    word[..end - offset].copy_from_slice(&input[offset..end]);
                }
                self.stack.push(U256::from_big_endian(&word))?;
            }
            Opcode::CALLDATASIZE => self.stack.push(U256::from(self.context.input.len()))?,
            Opcode::CALLDATACOPY => {
                let [mem_offset, data_offset, size] = self.stack.pop_n()?;
                let (mem_offset, size) = self.memory_range(rules, mem_offset, size)?;
                self.use_gas(gas::copy_gas(rules, size))?;
                let data_offset = arith::as_usize_saturated(data_offset);
                self.memory
                    .store_padded(mem_offset, &self.context.input, data_offset, size);
            }
            Opcode::CODESIZE => self.stack.push(U256::from(self.code.len()))?,
            Opcode::CODECOPY => {
                let [mem_offset, code_offset, size] = self.stack.pop_n()?;
                let (mem_offset, size) = self.memory_range(rules, mem_offset, size)?;
                self.use_gas(gas::copy_gas(rules, size))?;
                let code_offset = arith::as_usize_saturated(code_offset);
                self.memory
                    .store_padded(mem_offset, &self.code, code_offset, size);
            }
            Opcode::GASPRICE => self.stack.push(host.tx.gas_price)?,
            Opcode::EXTCODESIZE => {
                let address = Address::from_word(self.stack.pop()?);
                self.access_account(host, address)?;
                self.stack.push(U256::from(host.state.code(&address).len()))?;
            }
            Opcode::EXTCODECOPY => {
                let address = Address::from_word(self.stack.pop()?);
                let [mem_offset, code_offset, size] = self.stack.pop_n()?;
                self.access_account(host, address)?;
                let (mem_offset, size) = self.memory_range(rules, mem_offset, size)?;
                self.use_gas(gas::copy_gas(rules, size))?;
                let code = host.state.code(&address);
                let code_offset = arith::as_usize_saturated(code_offset);
                self.memory.store_padded(mem_offset, &code, code_offset, size);
            }
            Opcode::RETURNDATASIZE => self.stack.push(U256::from(self.return_data.len()))?,
            Opcode::RETURNDATACOPY => {
                let [mem_offset, data_offset, size] = self.stack.pop_n()?;
                let end = data_offset.overflowing_add(size);
                if end.1 || end.0 > U256::from(self.return_data.len()) {
                    return Err(EvmError::ReturnDataOutOfBounds);
                }
                let (mem_offset, size) = self.memory_range(rules, mem_offset, size)?;
                self.use_gas(gas::copy_gas(rules, size))?;
                let data_offset = data_offset.low_u64() as usize;
                self.memory.store_slice(
                    mem_offset,
                    &self.return_data[data_offset..data_offset + size],
                );
            }
            Opcode::EXTCODEHASH => {
                let address = Address::from_word(self.stack.pop()?);
                self.access_account(host, address)?;
                let hash = match host.state.account(&address) {
                    Some(account) if !account.is_empty() => account.code_hash().to_word(),
                    _ => U256::zero(),
                };
                self.stack.push(hash)?;
            }

            // Block Information
            Opcode::BLOCKHASH => {
                let requested = self.stack.pop()?;
                let current = host.env.number;
                let window = rules.value_or_zero(Param::BlockhashWindow);
                let hash = match u64::try_from(requested) {
                    Ok(n) if n < current && current - n <= window => {
                        host.env.block_hash(n).to_word()
                    }
                    _ => U256::zero(),
                };
                self.stack.push(hash)?;
            }
            Opcode::COINBASE => self.stack.push(host.env.coinbase.to_word())?,
            Opcode::TIMESTAMP => self.stack.push(U256::from(host.env.timestamp))?,
            Opcode::NUMBER => self.stack.push(U256::from(host.env.number))?,
            Opcode::PREVRANDAO => {
                let value = if rules.is_active(Param::Prevrandao) {
                    host.env.prevrandao.to_word()
                } else {
                    host.env.difficulty
                };
                self.stack.push(value)?;
            }
            Opcode::GASLIMIT => self.stack.push(U256::from(host.env.gas_limit))?,
            Opcode::CHAINID => self.stack.push(U256::from(host.env.chain_id))?,
            Opcode::SELFBALANCE => {
                self.stack
                    .push(host.state.balance(&self.context.address))?;
            }
            Opcode::BASEFEE => self.stack.push(host.env.base_fee)?,
            Opcode::BLOBHASH => {
                // no blob-carrying transactions
                self.stack.pop()?;
                self.stack.push(U256::zero())?;
            }
            Opcode::BLOBBASEFEE => self.stack.push(host.env.blob_base_fee)?,

            // Stack, Memory, Storage and Flow Operations
            Opcode::POP => {
                self.stack.pop()?;
            }
            Opcode::MLOAD => {
                let offset = self.stack.pop()?;
                let (offset, _) = self.memory_range(rules, offset, U256::from(32))?;
                self.stack.push(self.memory.load(offset))?;
            }
            Opcode::MSTORE => {
                let [offset, value] = self.stack.pop_n()?;
                let (offset, _) = self.memory_range(rules, offset, U256::from(32))?;
                self.memory.store(offset, value);
            }
            Opcode::MSTORE8 => {
                let [offset, value] = self.stack.pop_n()?;
                let (offset, _) = self.memory_range(rules, offset, U256::one())?;
                self.memory.store8(offset, value.byte(0));
            }
            Opcode::SLOAD => {
                let key = self.stack.pop()?;
                let address = self.context.address;
                if rules.value(Param::ColdSload).is_some() {
                    let cold = host.state.warm_slot(address, key);
                    self.use_gas(gas::sload_gas(rules, cold))?;
                }
                self.stack.push(host.state.sload(&address, &key))?;
            }
            Opcode::SSTORE => {
                self.require_non_static()?;
                let [key, value] = self.stack.pop_n()?;
                if let Some(sentry) = rules.value(Param::SstoreSentry) {
                    if self.gas <= sentry {
                        return Err(EvmError::OutOfGas);
                    }
                }
                let address = self.context.address;
                let cold = rules.value(Param::ColdSload).is_some()
                    && host.state.warm_slot(address, key);
                let slot = gas::SstoreSlot {
                    original: host.state.original_storage(&address, &key),
                    current: host.state.sload(&address, &key),
                    new: value,
                };
                let cost = gas::sstore_cost(rules, slot, cold);
                self.use_gas(cost.gas)?;
                host.state.add_refund(cost.refund);
                host.state.sstore(address, key, value);
            }
            Opcode::JUMP => {
                let dest = self.stack.pop()?;
                self.jump(dest)?;
            }
            Opcode::JUMPI => {
                let [dest, cond] = self.stack.pop_n()?;
                if !cond.is_zero() {
                    self.jump(dest)?;
                }
            }
            Opcode::PC => self.stack.push(U256::from(self.pc - 1))?,
            Opcode::MSIZE => self.stack.push(U256::from(self.memory.size()))?,
            Opcode::GAS => self.stack.push(U256::from(self.gas))?,
            Opcode::JUMPDEST => {}
            Opcode::TLOAD => {
                let key = self.stack.pop()?;
                self.stack
                    .push(host.state.tload(&self.context.address, &key))?;
            }
            Opcode::TSTORE => {
                self.require_non_static()?;
                let [key, value] = self.stack.pop_n()?;
                host.state.tstore(self.context.address, key, value);
            }
            Opcode::MCOPY => {
                let [dest, src, size] = self.stack.pop_n()?;
                let (dest, len) = self.memory_range(rules, dest, size)?;
                let (src, _) = self.memory_range(rules, src, size)?;
                self.use_gas(gas::copy_gas(rules, len))?;
                self.memory.copy(dest, src, len);
            }

            // Push operations
            Opcode::PUSH0 => self.stack.push(U256::zero())?,
            op if op.is_push() => {
                let size = op.push_size();
                let start = self.pc.min(self.code.len());
                let end = (self.pc + size).min(self.code.len());
                let mut word = [0u8; 32];
                // Operands running past the end of code read as zero
                word[32 - size..32 - size + (end - start)].copy_from_slice(&self.code[start..end]);
                self.stack.push(U256::from_big_endian(&word))?;
                self.pc += size;
            }

            // Dup operations
            op if op.dup_depth() > 0 => self.stack.dup(op.dup_depth())?,

            // Swap operations
            op if op.swap_depth() > 0 => self.stack.swap(op.swap_depth())?,

            // LOG operations
            op if op.is_log() => {
                self.require_non_static()?;
                let [offset, size] = self.stack.pop_n()?;
                let topic_count = op.log_topics();
                let mut topics = Vec::with_capacity(topic_count);
                for _ in 0..topic_count {
                    topics.push(H256::from_word(self.stack.pop()?));
                }
                let (offset, size) = self.memory_range(rules, offset, size)?;
                self.use_gas(gas::log_data_gas(rules, size))?;
                host.state.log(Log {
                    address: self.context.address,
                    topics,
                    data: Bytes::copy_from_slice(self.memory.slice(offset, size)),
                });
            }

            // System operations
            Opcode::CREATE => return self.create(rules, false),
            Opcode::CREATE2 => return self.create(rules, true),
            Opcode::CALL => return self.call(host, CallScheme::Call),
            Opcode::CALLCODE => return self.call(host, CallScheme::CallCode),
            Opcode::DELEGATECALL => return self.call(host, CallScheme::DelegateCall),
            Opcode::STATICCALL => return self.call(host, CallScheme::StaticCall),
            Opcode::RETURN => {
                let [offset, size] = self.stack.pop_n()?;
                let (offset, size) = self.memory_range(rules, offset, size)?;
                return Ok(Control::Return(Bytes::copy_from_slice(
                    self.memory.slice(offset, size),
                )));
            }
            Opcode::REVERT => {
                let [offset, size] = self.stack.pop_n()?;
                let (offset, size) = self.memory_range(rules, offset, size)?;
                return Ok(Control::Revert(Bytes::copy_from_slice(
                    self.memory.slice(offset, size),
                )));
            }
            Opcode::SELFDESTRUCT => return self.selfdestruct(host),
            Opcode::INVALID => return Err(EvmError::InvalidOpcode(0xFE)),

            // Every remaining opcode is a PUSH, DUP, SWAP or LOG handled above
            other => return Err(EvmError::InvalidOpcode(other as u8)),
        }
        Ok(Control::Continue)
    }

    fn call(&mut self, host: &mut Host<'_>, scheme: CallScheme) -> EvmResult<Control> {
        let rules = host.rules;
        let requested = self.stack.pop()?;
        let target = Address::from_word(self.stack.pop()?);
        let value = match scheme {
            CallScheme::Call | CallScheme::CallCode => self.stack.pop()?,
            CallScheme::DelegateCall | CallScheme::StaticCall => U256::zero(),
        };
        let [in_offset, in_size, out_offset, out_size] = self.stack.pop_n()?;

        let transfers_value = !value.is_zero();
        if scheme == CallScheme::Call && transfers_value {
            self.require_non_static()?;
        }

        let (in_offset, in_size) = self.memory_range(rules, in_offset, in_size)?;
        let (out_offset, out_size) = self.memory_range(rules, out_offset, out_size)?;
        self.access_account(host, target)?;

        let mut cost = 0u64;
        if transfers_value {
            cost += rules.value_or_zero(Param::CallValueTransfer);
        }
        if scheme == CallScheme::Call {
            let new_account = if rules.is_active(Param::EmptyAccountCleanup) {
                transfers_value && host.state.is_empty(&target)
            } else {
                !host.state.exists(&target)
            };
            if new_account {
                cost += rules.value_or_zero(Param::CallNewAccount);
            }
        }
        self.use_gas(cost)?;

        let child_gas = gas::call_gas(rules, requested, self.gas).ok_or(EvmError::OutOfGas)?;
        self.use_gas(child_gas)?;
        let gas_limit = if transfers_value {
            child_gas + rules.value_or_zero(Param::CallStipend)
        } else {
            child_gas
        };

        let here = self.context.address;
        let (caller, address, apparent_value) = match scheme {
            CallScheme::Call => (here, target, value),
            CallScheme::CallCode => (here, here, value),
            CallScheme::DelegateCall => (self.context.caller, here, self.context.value),
            CallScheme::StaticCall => (here, target, U256::zero()),
        };

        self.return_data = Bytes::new();
        Ok(Control::Call(CallInput {
            scheme,
            caller,
            address,
            code_address: target,
            value: apparent_value,
            transfer: matches!(scheme, CallScheme::Call | CallScheme::CallCode),
            input: Bytes::copy_from_slice(self.memory.slice(in_offset, in_size)),
            gas_limit,
            is_static: self.context.is_static || scheme == CallScheme::StaticCall,
            depth: self.context.depth + 1,
            return_offset: out_offset,
            return_size: out_size,
        }))
    }

    fn create(&mut self, rules: &ForkRules, create2: bool) -> EvmResult<Control> {
        self.require_non_static()?;
        let [value, offset, size] = self.stack.pop_n()?;
        let scheme = if create2 {
            CreateScheme::Create2 {
                salt: self.stack.pop()?,
            }
        } else {
            CreateScheme::Create
        };

        let (offset, size) = self.memory_range(rules, offset, size)?;
        if let Some(limit) = rules.value(Param::MaxInitCodeSize) {
            if size as u64 > limit {
                return Err(EvmError::MaxInitCodeSizeExceeded);
            }
        }
        self.use_gas(gas::init_code_gas(rules, size))?;
        if create2 {
            self.use_gas(gas::keccak_word_gas(rules, size))?;
        }

        let gas_limit = gas::create_gas(rules, self.gas);
        self.use_gas(gas_limit)?;

        self.return_data = Bytes::new();
        Ok(Control::Create(CreateInput {
            caller: self.context.address,
            scheme,
            value,
            init_code: Bytes::copy_from_slice(self.memory.slice(offset, size)),
            gas_limit,
            depth: self.context.depth + 1,
        }))
    }

    fn selfdestruct(&mut self, host: &mut Host<'_>) -> EvmResult<Control> {
        let rules = host.rules;
        self.require_non_static()?;
        let beneficiary = Address::from_word(self.stack.pop()?);
        let address = self.context.address;

        if let Some(cold_cost) = rules.value(Param::ColdAccountAccess) {
            if host.state.warm_account(beneficiary) {
                self.use_gas(cold_cost)?;
            }
        }

        let balance = host.state.balance(&address);
        if let Some(new_account_cost) = rules.value(Param::SelfdestructNewAccount) {
            let charge = if rules.is_active(Param::EmptyAccountCleanup) {
                !balance.is_zero() && host.state.is_empty(&beneficiary)
            } else {
                !host.state.exists(&beneficiary)
            };
            if charge {
                self.use_gas(new_account_cost)?;
            }
        }

        let destroys = !rules.is_active(Param::SelfdestructSameTxOnly)
            || host.state.created_in_tx(&address);
        if destroys && !host.state.is_destructed(&address) {
            host.state
                .add_refund(rules.value_or_zero(Param::SelfdestructRefund) as i64);
        }

        if beneficiary != address {
            host.state.add_balance(beneficiary, balance);
            host.state.set_balance(address, U256::zero());
        } else if destroys {
            host.state.set_balance(address, U256::zero());
        }
        host.state.touch(beneficiary);
        if destroys {
            host.state.mark_destructed(address);
        }
        Ok(Control::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TxEnv;
    use crate::journal::JournaledState;
    use bach_forks::{Fork, ForkRuleset};
    use bach_types::{Environment, WorldState};

    const CONTRACT: u64 = 0x1000;

    fn run_code_at(fork: Fork, code: &[u8], gas: u64) -> (FrameResult, JournaledState) {
        let mut state = JournaledState::new(WorldState::new());
        let env = Environment::default();
        let rules = ForkRuleset::standard().rules(fork);
        let tx = TxEnv::default();
        let context = CallContext {
            address: Address::from_low_u64_be(CONTRACT),
            ..Default::default()
        };
        let mut interp = Interpreter::new(context, Bytes::copy_from_slice(code), gas);
        let action = {
            let mut host = Host::new(&mut state, &env, &rules, &tx, None);
            interp.run(&mut host)
        };
        match action {
            InterpreterAction::Return(result) => (result, state),
            other => panic!("unexpected action {other:?}"),
        }
    }

    fn run_code(code: &[u8], gas: u64) -> FrameResult {
        run_code_at(Fork::Cancun, code, gas).0
    }

    fn word(output: &[u8]) -> U256 {
        U256::from_big_endian(output)
    }

    // Appends MSTORE(0, top) RETURN(0, 32)
    fn returning_top(mut code: Vec<u8>) -> Vec<u8> {
        code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3]);
        code
    }

    // ==================== Basic flow ====================

    #[test]
    fn test_stop() {
        let result = run_code(&[0x00], 1000);
        assert!(result.is_success());
        assert_eq!(result.gas_left, 1000);
    }

    #[test]
    fn test_end_of_code_is_stop() {
        let result = run_code(&[0x60, 0x01], 1000);
        assert!(result.is_success());
        assert_eq!(result.gas_left, 997);
    }

    #[test]
    fn test_push_add() {
        // PUSH1 3, PUSH1 5, ADD
        let result = run_code(&returning_top(vec![0x60, 0x03, 0x60, 0x05, 0x01]), 1000);
        assert!(result.is_success());
        assert_eq!(word(&result.output), U256::from(8));
    }

    #[test]
    fn test_sub_operand_order() {
        // PUSH1 3, PUSH1 10, SUB -> 10 - 3
        let result = run_code(&returning_top(vec![0x60, 0x03, 0x60, 0x0a, 0x03]), 1000);
        assert_eq!(word(&result.output), U256::from(7));
    }

    #[test]
    fn test_truncated_push_reads_zero() {
        // PUSH2 with only one operand byte left
        let (result, _) = run_code_at(Fork::Cancun, &[0x61, 0x01], 1000);
        assert!(result.is_success());
        let code = returning_top(vec![0x60, 0x07, 0x61, 0x01]);
        // the MSTORE/RETURN tail is swallowed as PUSH2 operand bytes
        let result = run_code(&code, 1000);
        assert!(result.is_success());
        assert!(result.output.is_empty());
    }

    // ==================== Halts ====================

    #[test]
    fn test_invalid_opcode_consumes_all_gas() {
        let result = run_code(&[0xfe], 1000);
        assert_eq!(result.status, FrameStatus::Halt(EvmError::InvalidOpcode(0xfe)));
        assert_eq!(result.gas_left, 0);
    }

    #[test]
    fn test_opcode_not_yet_active() {
        // PUSH0 before Shanghai
        let (result, _) = run_code_at(Fork::London, &[0x5f], 1000);
        assert_eq!(result.status, FrameStatus::Halt(EvmError::InvalidOpcode(0x5f)));
        // CHAINID before Istanbul
        let (result, _) = run_code_at(Fork::ConstantinopleFix, &[0x46], 1000);
        assert_eq!(result.status, FrameStatus::Halt(EvmError::InvalidOpcode(0x46)));
    }

    #[test]
    fn test_out_of_gas() {
        let result = run_code(&[0x60, 0x01, 0x60, 0x02, 0x01], 8);
        assert_eq!(result.status, FrameStatus::Halt(EvmError::OutOfGas));
    }

    #[test]
    fn test_stack_underflow() {
        let result = run_code(&[0x01], 1000);
        assert_eq!(result.status, FrameStatus::Halt(EvmError::StackUnderflow));
    }

    #[test]
    fn test_invalid_jump() {
        // PUSH1 3, JUMP, STOP, (no JUMPDEST at 3)
        let result = run_code(&[0x60, 0x03, 0x56, 0x00], 1000);
        assert_eq!(result.status, FrameStatus::Halt(EvmError::InvalidJump(3)));
    }

    #[test]
    fn test_jump_into_push_data() {
        // PUSH1 0x5b looks like a JUMPDEST at offset 1 but is data
        let result = run_code(&[0x60, 0x5b, 0x60, 0x01, 0x56], 1000);
        assert_eq!(result.status, FrameStatus::Halt(EvmError::InvalidJump(1)));
    }

    #[test]
    fn test_jumpi_taken() {
        // PUSH1 1, PUSH1 6, JUMPI, INVALID, JUMPDEST, STOP
        let result = run_code(&[0x60, 0x01, 0x60, 0x06, 0x57, 0xfe, 0x5b, 0x00], 1000);
        assert!(result.is_success());
    }

    // ==================== Revert ====================

    #[test]
    fn test_revert_keeps_gas_and_output() {
        // PUSH1 0xaa, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, REVERT
        let code = [0x60, 0xaa, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xfd];
        let result = run_code(&code, 1000);
        assert_eq!(result.status, FrameStatus::Revert);
        assert_eq!(result.output.as_ref(), &[0xaa]);
        assert!(result.gas_left > 0);
    }

    // ==================== Memory ====================

    #[test]
    fn test_memory_expansion_cost() {
        // PUSH1 0, MLOAD: 3 static + 3 memory
        let result = run_code(&[0x60, 0x00, 0x51], 100);
        assert_eq!(result.gas_left, 100 - 3 - 3 - 3);
    }

    #[test]
    fn test_huge_memory_offset_is_out_of_gas() {
        // PUSH32 0xff.., MLOAD
        let mut code = vec![0x7f];
        code.extend_from_slice(&[0xff; 32]);
        code.push(0x51);
        let result = run_code(&code, 1_000_000);
        assert_eq!(result.status, FrameStatus::Halt(EvmError::OutOfGas));
    }

    // ==================== Environment ====================

    #[test]
    fn test_chainid() {
        let result = run_code(&returning_top(vec![0x46]), 1000);
        assert_eq!(word(&result.output), U256::one());
    }

    #[test]
    fn test_pc() {
        // JUMPDEST, PC -> 1
        let result = run_code(&returning_top(vec![0x5b, 0x58]), 1000);
        assert_eq!(word(&result.output), U256::one());
    }

    #[test]
    fn test_difficulty_becomes_prevrandao() {
        let (before, _) = run_code_at(Fork::London, &returning_top(vec![0x44]), 1000);
        assert_eq!(word(&before.output), U256::from(0x20000));
        let (after, _) = run_code_at(Fork::Paris, &returning_top(vec![0x44]), 1000);
        assert_eq!(word(&after.output), U256::zero());
    }

    // ==================== Storage ====================

    #[test]
    fn test_sstore_sload() {
        // PUSH1 7, PUSH1 1, SSTORE, PUSH1 1, SLOAD
        let code = returning_top(vec![0x60, 0x07, 0x60, 0x01, 0x55, 0x60, 0x01, 0x54]);
        let (result, state) = run_code_at(Fork::Cancun, &code, 100_000);
        assert!(result.is_success());
        assert_eq!(word(&result.output), U256::from(7));
        let contract = Address::from_low_u64_be(CONTRACT);
        assert_eq!(state.sload(&contract, &U256::one()), U256::from(7));
    }

    #[test]
    fn test_sstore_sentry() {
        // PUSH1 1, PUSH1 0, SSTORE with 2306 gas: 2300 left at SSTORE
        let (result, _) = run_code_at(Fork::Istanbul, &[0x60, 0x01, 0x60, 0x00, 0x55], 2306);
        assert_eq!(result.status, FrameStatus::Halt(EvmError::OutOfGas));
    }

    #[test]
    fn test_cold_then_warm_sload() {
        // PUSH1 0, SLOAD, PUSH1 0, SLOAD
        let code = [0x60, 0x00, 0x54, 0x60, 0x00, 0x54];
        let (result, _) = run_code_at(Fork::Berlin, &code, 10_000);
        assert_eq!(result.gas_left, 10_000 - 3 - 2100 - 3 - 100);
        let (result, _) = run_code_at(Fork::Istanbul, &code, 10_000);
        assert_eq!(result.gas_left, 10_000 - 3 - 800 - 3 - 800);
    }

    #[test]
    fn test_transient_storage() {
        // PUSH1 5, PUSH1 0, TSTORE, PUSH1 0, TLOAD
        let code = returning_top(vec![0x60, 0x05, 0x60, 0x00, 0x5d, 0x60, 0x00, 0x5c]);
        let result = run_code(&code, 10_000);
        assert_eq!(word(&result.output), U256::from(5));
    }

    // ==================== Logs ====================

    #[test]
    fn test_log1() {
        // PUSH1 0xbb (topic), PUSH1 0, PUSH1 0, LOG1
        let code = [0x60, 0xbb, 0x60, 0x00, 0x60, 0x00, 0xa1];
        let (result, state) = run_code_at(Fork::Cancun, &code, 10_000);
        assert!(result.is_success());
        assert_eq!(result.gas_left, 10_000 - 9 - 750);
        let (_, logs) = state.finalize(false);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].topics[0], H256::from_word(U256::from(0xbb)));
    }

    // ==================== Calls ====================

    #[test]
    fn test_call_yields_to_engine() {
        // CALL(gas=0xffff, to=0x2000, value=0, 0, 0, 0, 0)
        let code = [
            0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x61, 0x20, 0x00, 0x61,
            0xff, 0xff, 0xf1,
        ];
        let mut state = JournaledState::new(WorldState::new());
        let env = Environment::default();
        let rules = ForkRuleset::standard().rules(Fork::Cancun);
        let tx = TxEnv::default();
        let mut interp = Interpreter::new(
            CallContext {
                address: Address::from_low_u64_be(CONTRACT),
                ..Default::default()
            },
            Bytes::copy_from_slice(&code),
            100_000,
        );
        let mut host = Host::new(&mut state, &env, &rules, &tx, None);
        match interp.run(&mut host) {
            InterpreterAction::Call(input) => {
                assert_eq!(input.address, Address::from_low_u64_be(0x2000));
                assert_eq!(input.gas_limit, 0xffff);
                assert_eq!(input.depth, 1);
                assert!(input.transfer);
                // 7 pushes + cold access
                assert_eq!(interp.gas_remaining(), 100_000 - 21 - 2600 - 0xffff);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_static_context_rejects_sstore() {
        let mut state = JournaledState::new(WorldState::new());
        let env = Environment::default();
        let rules = ForkRuleset::standard().rules(Fork::Cancun);
        let tx = TxEnv::default();
        let mut interp = Interpreter::new(
            CallContext {
                is_static: true,
                ..Default::default()
            },
            Bytes::from_static(&[0x60, 0x01, 0x60, 0x00, 0x55]),
            100_000,
        );
        let mut host = Host::new(&mut state, &env, &rules, &tx, None);
        match interp.run(&mut host) {
            InterpreterAction::Return(result) => {
                assert_eq!(result.status, FrameStatus::Halt(EvmError::StaticCallViolation))
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_resume_call_copies_output() {
        let mut interp = Interpreter::new(CallContext::default(), Bytes::new(), 0);
        interp.memory.resize_words(1);
        interp.resume_call(FrameResult::success(50, Bytes::from_static(&[1, 2, 3])), 0, 2);
        assert_eq!(interp.gas_remaining(), 50);
        assert_eq!(interp.memory.slice(0, 3), &[1, 2, 0]);
        assert_eq!(interp.return_data(), &[1, 2, 3]);
        assert_eq!(interp.stack.pop().unwrap(), U256::one());
    }
}
