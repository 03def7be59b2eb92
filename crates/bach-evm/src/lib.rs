//! # bach-evm
//!
//! EVM execution engine for the state transition harness.
//!
//! This crate provides:
//! - EVM interpreter with per-fork gas metering
//! - Journaled world state with warm/cold access tracking
//! - Explicit call-frame stack for CALL/CREATE families
//! - Transaction validation and fee settlement

#![warn(missing_docs)]
#![warn(clippy::all)]

mod arith;
mod context;
mod engine;
mod error;
mod frame;
mod gas;
mod interpreter;
mod journal;
mod memory;
mod opcode;
mod precompile;
mod stack;

pub use context::{CallContext, CallScheme, Host, TxEnv};
pub use engine::{create2_address, create_address, EngineConfig, ExecutionEngine};
pub use error::{EvmError, EvmResult, ExecutionResult, Log, Outcome};
pub use frame::{CallInput, CreateInput, CreateScheme, FrameResult, FrameStatus, InterpreterAction};
pub use interpreter::Interpreter;
pub use journal::{Checkpoint, JournaledState};
pub use memory::Memory;
pub use opcode::Opcode;
pub use precompile::{Precompile, PrecompileOutput};
pub use stack::{Stack, STACK_LIMIT};
