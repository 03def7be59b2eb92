//! # bach-harness
//!
//! Single-transaction state tests: allocate a pre-state, build and sign a
//! transaction, execute it under one fork and verify the resulting state.
//!
//! - [`AccountAllocator`]: deterministic contract and EOA addresses
//! - [`TransactionBuilder`]: validated, signed transactions
//! - [`PostStateVerifier`]: partial post-state comparison
//! - [`Runner`]: parallel execution of [`Scenario`]s across forks
//! - [`fixture`]: JSON scenario files

#![warn(missing_docs)]
#![warn(clippy::all)]

mod allocator;
mod builder;
mod chain;
pub mod compiled;
mod config;
mod error;
pub mod fixture;
mod runner;
mod scenario;
pub mod scenarios;
mod verifier;

pub use allocator::{AccountAllocator, Deployment, Eoa, CONTRACT_START, CONTRACT_STEP, EOA_START_KEY};
pub use builder::{TransactionBuilder, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};
pub use chain::{ChainIdSource, FixedChainId, RemoteNode};
pub use compiled::CompiledCode;
pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult, SetupError, SetupResult};
pub use runner::{RunStats, RunSummary, Runner, ScenarioReport};
pub use scenario::{Scenario, ScenarioInput, ScenarioSpec};
pub use verifier::{
    Expectation, ExpectedAccount, ExpectedPostState, Field, Mismatch, PostStateVerifier,
};
