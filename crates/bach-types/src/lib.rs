//! # bach-types
//!
//! Value types shared by the execution engine and the test harness.
//!
//! This crate provides:
//! - [`Account`](account::Account) and [`WorldState`](state::WorldState)
//! - [`Environment`](env::Environment) - block context
//! - [`Transaction`](transaction::Transaction) - unsigned and signed transactions
//! - [`intrinsic_gas`](intrinsic::intrinsic_gas) - pre-execution gas charge

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod account;
pub mod env;
pub mod error;
pub mod intrinsic;
pub mod state;
pub mod transaction;

// Re-export commonly used types
pub use account::{Account, EMPTY_CODE_HASH};
pub use env::{Environment, DEFAULT_COINBASE};
pub use error::TxError;
pub use intrinsic::intrinsic_gas;
pub use state::{AccountChange, StateDiff, WorldState};
pub use transaction::{
    AccessListItem, AccessListTx, DynamicFeeTx, LegacyTx, SignedTransaction, Transaction,
    TxSignature, TxType,
};
