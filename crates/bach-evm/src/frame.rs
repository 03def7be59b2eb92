//! Call frames and the messages passed between them

use crate::context::CallScheme;
use crate::error::EvmError;
use crate::interpreter::Interpreter;
use crate::journal::Checkpoint;
use bach_primitives::{Address, U256};
use bytes::Bytes;

/// Request to enter a message-call frame
#[derive(Clone, Debug)]
pub struct CallInput {
    /// Call flavour
    pub scheme: CallScheme,
    /// Caller as seen by the callee
    pub caller: Address,
    /// Account the callee acts on
    pub address: Address,
    /// Account whose code runs
    pub code_address: Address,
    /// Value as seen by CALLVALUE
    pub value: U256,
    /// Whether `value` moves from `caller` to `address`
    pub transfer: bool,
    /// Call data
    pub input: Bytes,
    /// Gas for the callee, stipend included
    pub gas_limit: u64,
    /// Static context
    pub is_static: bool,
    /// Callee depth
    pub depth: usize,
    /// Where the caller wants the output
    pub return_offset: usize,
    /// How many output bytes the caller keeps
    pub return_size: usize,
}

/// CREATE address derivation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateScheme {
    /// rlp(sender, nonce)
    Create,
    /// keccak(0xff ‖ sender ‖ salt ‖ keccak(init code))
    Create2 {
        /// Salt
        salt: U256,
    },
}

/// Request to enter a contract-creation frame
#[derive(Clone, Debug)]
pub struct CreateInput {
    /// Creating account
    pub caller: Address,
    /// Address derivation
    pub scheme: CreateScheme,
    /// Endowment
    pub value: U256,
    /// Init code
    pub init_code: Bytes,
    /// Gas for the init code
    pub gas_limit: u64,
    /// Child depth
    pub depth: usize,
}

/// How a frame ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// STOP, RETURN, end of code, or SELFDESTRUCT
    Success,
    /// REVERT, or a call rejected before entering (depth, balance)
    Revert,
    /// Exceptional halt; all gas consumed
    Halt(EvmError),
}

/// Result handed back to the parent frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameResult {
    /// How the frame ended
    pub status: FrameStatus,
    /// Gas returned to the parent
    pub gas_left: u64,
    /// Return or revert data
    pub output: Bytes,
}

impl FrameResult {
    /// Successful result
    pub fn success(gas_left: u64, output: Bytes) -> Self {
        Self {
            status: FrameStatus::Success,
            gas_left,
            output,
        }
    }

    /// Revert result
    pub fn revert(gas_left: u64, output: Bytes) -> Self {
        Self {
            status: FrameStatus::Revert,
            gas_left,
            output,
        }
    }

    /// Exceptional halt
    pub fn halt(error: EvmError) -> Self {
        Self {
            status: FrameStatus::Halt(error),
            gas_left: 0,
            output: Bytes::new(),
        }
    }

    /// Whether the frame succeeded
    pub fn is_success(&self) -> bool {
        self.status == FrameStatus::Success
    }
}

/// What the interpreter needs from the engine next
#[derive(Debug)]
pub enum InterpreterAction {
    /// Enter a call frame
    Call(CallInput),
    /// Enter a creation frame
    Create(CreateInput),
    /// Frame finished
    Return(FrameResult),
    /// Step limit reached; the whole transaction is abandoned
    Abort,
}

/// What to do with a frame's result once it finishes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// Copy output into the caller's memory
    Call {
        /// Destination offset
        return_offset: usize,
        /// Bytes kept
        return_size: usize,
    },
    /// Deposit code at `address`
    Create {
        /// New contract
        address: Address,
    },
}

/// A running frame on the engine's frame stack
#[derive(Debug)]
pub struct Frame {
    /// Interpreter state
    pub interpreter: Interpreter,
    /// Result handling
    pub kind: FrameKind,
    /// State position to revert to on failure
    pub checkpoint: Checkpoint,
}
