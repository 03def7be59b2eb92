//! Error types for scenario setup and harness runs

use bach_crypto::CryptoError;
use bach_forks::ForkError;
use bach_primitives::{Address, QuantityError, U256};
use bach_types::TxError;
use thiserror::Error;

/// Scenario construction errors. Any of these aborts the scenario before
/// execution.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Chain id missing, zero, or not the one the scenario runs on
    #[error("invalid chain id: expected {expected}, got {got:?}")]
    InvalidChainId {
        /// Chain id of the environment
        expected: u64,
        /// Chain id supplied to the transaction
        got: Option<u64>,
    },

    /// Signing key does not belong to the sender
    #[error("signature mismatch: sender {sender}, signer {signer}")]
    SignatureMismatch {
        /// Declared sender
        sender: Address,
        /// Address recovered from the signature
        signer: Address,
    },

    /// Sender cannot cover value plus maximum fee
    #[error("insufficient funds for {address}: required {required}, balance {balance}")]
    InsufficientFunds {
        /// Sender
        address: Address,
        /// Value plus gas_limit × max fee
        required: U256,
        /// Pre-state balance
        balance: U256,
    },

    /// Transaction nonce differs from the sender's account nonce
    #[error("nonce mismatch for {address}: expected {expected}, got {got}")]
    NonceMismatch {
        /// Sender
        address: Address,
        /// Pre-state nonce
        expected: u64,
        /// Transaction nonce
        got: u64,
    },

    /// Two accounts allocated at the same address
    #[error("address collision at {0}")]
    AddressCollision(Address),

    /// Fork does not support a requested feature
    #[error(transparent)]
    FeatureNotActive(#[from] ForkError),

    /// Transaction has no sender
    #[error("transaction has no sender")]
    MissingSender,

    /// No key available to sign for the sender
    #[error("no signing key for {0}")]
    MissingKey(Address),

    /// Compiled code gas table disagrees with the fork
    #[error("gas table mismatch for opcode 0x{opcode:02x}: table {table}, fork {fork:?}")]
    GasTableMismatch {
        /// Opcode byte
        opcode: u8,
        /// Cost in the compiled-code table
        table: u64,
        /// Cost at the active fork, `None` if unavailable
        fork: Option<u64>,
    },

    /// Key handling failure
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Transaction signing failure
    #[error("transaction error: {0}")]
    Transaction(#[from] TxError),
}

/// Harness errors outside a single scenario
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Scenario setup error
    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed quantity in a fixture or config
    #[error("quantity error: {0}")]
    Quantity(#[from] QuantityError),

    /// Fixture content error
    #[error("fixture error: {0}")]
    Fixture(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type for scenario setup
pub type SetupResult<T> = Result<T, SetupError>;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;
