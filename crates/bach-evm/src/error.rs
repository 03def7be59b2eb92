//! EVM error and result types

use bach_forks::Fork;
use bach_primitives::{Address, H256, U256};
use bach_types::{StateDiff, WorldState};
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// EVM execution errors.
///
/// The first group halts the current frame and consumes its gas. The second
/// group rejects the transaction before any state changes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvmError {
    /// Out of gas
    #[error("out of gas")]
    OutOfGas,

    /// Stack underflow
    #[error("stack underflow")]
    StackUnderflow,

    /// Stack overflow
    #[error("stack overflow (max 1024)")]
    StackOverflow,

    /// Invalid jump destination
    #[error("invalid jump destination: {0}")]
    InvalidJump(usize),

    /// Opcode undefined at the active fork
    #[error("invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),

    /// Write in static context
    #[error("state modification in static context")]
    StaticCallViolation,

    /// Return data out of bounds
    #[error("return data out of bounds")]
    ReturnDataOutOfBounds,

    /// Contract creation collision
    #[error("contract address collision")]
    CreateCollision,

    /// Deployed code over the EIP-170 limit
    #[error("max code size exceeded")]
    MaxCodeSizeExceeded,

    /// Deployed code starts with 0xEF (EIP-3541)
    #[error("deployed code starts with 0xef")]
    InvalidCodePrefix,

    /// CREATE init code over the EIP-3860 limit
    #[error("init code size exceeded")]
    MaxInitCodeSizeExceeded,

    /// Precompile error
    #[error("precompile error: {0}")]
    PrecompileError(String),

    /// Transaction type not active at the fork
    #[error("transaction type {tx_type} is not active at {fork}")]
    TxTypeNotActive {
        /// Envelope type byte
        tx_type: u8,
        /// Active fork
        fork: Fork,
    },

    /// EIP-155 signature before replay protection exists
    #[error("replay-protected transaction is not valid at {0}")]
    ReplayProtectionNotActive(Fork),

    /// Signature commits to another chain
    #[error("chain id mismatch: expected {expected}, got {got}")]
    ChainIdMismatch {
        /// Environment chain id
        expected: u64,
        /// Transaction chain id
        got: u64,
    },

    /// Sender could not be recovered
    #[error("invalid sender: {0}")]
    InvalidSender(String),

    /// Nonce differs from the sender's account nonce
    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch {
        /// Account nonce
        expected: u64,
        /// Transaction nonce
        got: u64,
    },

    /// Gas limit below the intrinsic cost
    #[error("intrinsic gas {intrinsic} exceeds gas limit {limit}")]
    IntrinsicGasTooLow {
        /// Intrinsic gas
        intrinsic: u64,
        /// Transaction gas limit
        limit: u64,
    },

    /// Gas limit above the block gas limit
    #[error("gas limit {limit} exceeds block gas limit {block}")]
    BlockGasLimitExceeded {
        /// Transaction gas limit
        limit: u64,
        /// Block gas limit
        block: u64,
    },

    /// Max fee below the block base fee
    #[error("max fee per gas {max_fee} below base fee {base_fee}")]
    FeeCapTooLow {
        /// Max fee per gas
        max_fee: U256,
        /// Block base fee
        base_fee: U256,
    },

    /// Priority fee greater than the max fee
    #[error("max priority fee per gas above max fee per gas")]
    TipAboveFeeCap,

    /// Balance cannot cover value plus maximum fee
    #[error("insufficient funds: required {required}, balance {balance}")]
    InsufficientFunds {
        /// Value plus gas_limit × max fee
        required: U256,
        /// Sender balance
        balance: U256,
    },

    /// Creation transaction init code over the EIP-3860 limit
    #[error("init code of {size} bytes exceeds limit {limit}")]
    InitCodeTooLarge {
        /// Init code size
        size: usize,
        /// Limit
        limit: u64,
    },

    /// Transaction gas limit above the engine's configured ceiling
    #[error("gas limit {limit} exceeds engine ceiling {ceiling}")]
    GasCeilingExceeded {
        /// Transaction gas limit
        limit: u64,
        /// Configured ceiling
        ceiling: u64,
    },

    /// Engine step limit reached
    #[error("step limit of {0} reached")]
    StepLimitExceeded(u64),
}

/// Result type for EVM operations
pub type EvmResult<T> = Result<T, EvmError>;

/// Classified outcome of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Top frame returned normally
    Success,
    /// Top frame executed REVERT
    Revert,
    /// Top frame ran out of gas
    OutOfGas,
    /// Top frame halted on an undefined opcode or another exceptional halt
    InvalidOpcode,
    /// Transaction rejected before execution
    Fatal,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Success => "success",
            Outcome::Revert => "revert",
            Outcome::OutOfGas => "out-of-gas",
            Outcome::InvalidOpcode => "invalid-opcode",
            Outcome::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Log entry emitted by LOG opcodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Log {
    /// Contract address that emitted the log
    pub address: Address,
    /// Log topics (0-4)
    pub topics: Vec<H256>,
    /// Log data
    pub data: Bytes,
}

/// Everything observable about one executed transaction
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Classified outcome
    pub outcome: Outcome,
    /// Halt or rejection reason
    pub error: Option<EvmError>,
    /// Gas charged to the sender, after refunds
    pub gas_used: u64,
    /// Refund applied
    pub gas_refunded: u64,
    /// Return data (or revert data)
    pub output: Bytes,
    /// Logs emitted
    pub logs: Vec<Log>,
    /// Address of a contract created by the transaction
    pub contract_address: Option<Address>,
    /// State after the transaction
    pub post_state: WorldState,
    /// Accounts changed relative to the pre-state
    pub diff: StateDiff,
    /// Execution stopped by an engine limit; post state equals pre state
    pub aborted: bool,
}

impl ExecutionResult {
    /// Result for a transaction rejected before execution
    pub fn rejected(pre: &WorldState, error: EvmError) -> Self {
        Self {
            outcome: Outcome::Fatal,
            error: Some(error),
            gas_used: 0,
            gas_refunded: 0,
            output: Bytes::new(),
            logs: Vec::new(),
            contract_address: None,
            post_state: pre.clone(),
            diff: StateDiff::default(),
            aborted: false,
        }
    }

    /// Result for a transaction stopped by an engine limit
    pub fn aborted(pre: &WorldState, error: EvmError) -> Self {
        Self {
            outcome: Outcome::OutOfGas,
            aborted: true,
            ..Self::rejected(pre, error)
        }
    }

    /// Whether the top frame succeeded
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bach_types::Account;

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", EvmError::OutOfGas), "out of gas");
        assert_eq!(format!("{}", EvmError::StackUnderflow), "stack underflow");
        assert_eq!(format!("{}", EvmError::InvalidJump(100)), "invalid jump destination: 100");
        assert_eq!(format!("{}", EvmError::InvalidOpcode(0xFE)), "invalid opcode: 0xfe");
        assert_eq!(
            format!(
                "{}",
                EvmError::TxTypeNotActive {
                    tx_type: 2,
                    fork: Fork::Berlin
                }
            ),
            "transaction type 2 is not active at Berlin"
        );
        assert_eq!(
            format!(
                "{}",
                EvmError::IntrinsicGasTooLow {
                    intrinsic: 21000,
                    limit: 20000
                }
            ),
            "intrinsic gas 21000 exceeds gas limit 20000"
        );
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(Outcome::OutOfGas.to_string(), "out-of-gas");
        assert_eq!(Outcome::Fatal.to_string(), "fatal");
    }

    #[test]
    fn test_rejected_keeps_pre_state() {
        let mut pre = WorldState::new();
        pre.insert(Address::from_low_u64_be(1), Account::with_balance(U256::from(5)));

        let result = ExecutionResult::rejected(&pre, EvmError::TipAboveFeeCap);
        assert_eq!(result.outcome, Outcome::Fatal);
        assert_eq!(result.post_state, pre);
        assert!(result.diff.is_empty());
        assert!(!result.aborted);

        let result = ExecutionResult::aborted(&pre, EvmError::StepLimitExceeded(10));
        assert_eq!(result.outcome, Outcome::OutOfGas);
        assert!(result.aborted);
        assert_eq!(result.post_state, pre);
    }
}
