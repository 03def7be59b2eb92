//! Execution context for EVM

use crate::journal::JournaledState;
use bach_forks::ForkRules;
use bach_primitives::{Address, U256};
use bach_types::Environment;
use bytes::Bytes;

/// Message-call flavour
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallScheme {
    /// CALL (or the transaction's own call)
    Call,
    /// CALLCODE: callee code, caller storage, value sent to self
    CallCode,
    /// DELEGATECALL: callee code, caller storage, caller's caller and value
    DelegateCall,
    /// STATICCALL: no state modification below this frame
    StaticCall,
}

/// Call context information
#[derive(Clone, Debug)]
pub struct CallContext {
    /// Account whose storage and balance the frame acts on
    pub address: Address,
    /// Caller address
    pub caller: Address,
    /// Account the executing code was loaded from
    pub code_address: Address,
    /// Call value in wei as seen by CALLVALUE
    pub value: U256,
    /// Call data
    pub input: Bytes,
    /// Whether this is a static call (no state modifications)
    pub is_static: bool,
    /// Call depth
    pub depth: usize,
}

impl Default for CallContext {
    fn default() -> Self {
        Self {
            address: Address::ZERO,
            caller: Address::ZERO,
            code_address: Address::ZERO,
            value: U256::zero(),
            input: Bytes::new(),
            is_static: false,
            depth: 0,
        }
    }
}

/// Transaction-scoped values visible to ORIGIN and GASPRICE
#[derive(Clone, Debug, Default)]
pub struct TxEnv {
    /// Transaction sender
    pub origin: Address,
    /// Effective gas price
    pub gas_price: U256,
}

/// Everything a running frame may read or mutate outside itself
pub struct Host<'a> {
    /// Journaled world state
    pub state: &'a mut JournaledState,
    /// Block context
    pub env: &'a Environment,
    /// Resolved fork rules
    pub rules: &'a ForkRules,
    /// Transaction context
    pub tx: &'a TxEnv,
    steps: u64,
    max_steps: Option<u64>,
}

impl<'a> Host<'a> {
    /// Bundle the execution context
    pub fn new(
        state: &'a mut JournaledState,
        env: &'a Environment,
        rules: &'a ForkRules,
        tx: &'a TxEnv,
        max_steps: Option<u64>,
    ) -> Self {
        Self {
            state,
            env,
            rules,
            tx,
            steps: 0,
            max_steps,
        }
    }

    /// Count one executed instruction; false once the step limit is passed
    pub fn tick(&mut self) -> bool {
        self.steps += 1;
        self.max_steps.map_or(true, |max| self.steps <= max)
    }

    /// Instructions executed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Configured step limit
    pub fn max_steps(&self) -> Option<u64> {
        self.max_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bach_forks::{Fork, ForkRuleset};
    use bach_types::WorldState;

    #[test]
    fn test_call_context_default() {
        let ctx = CallContext::default();
        assert_eq!(ctx.address, Address::ZERO);
        assert!(ctx.value.is_zero());
        assert!(!ctx.is_static);
        assert_eq!(ctx.depth, 0);
    }

    #[test]
    fn test_step_limit() {
        let mut state = JournaledState::new(WorldState::new());
        let env = Environment::default();
        let rules = ForkRuleset::standard().rules(Fork::Cancun);
        let tx = TxEnv::default();
        let mut host = Host::new(&mut state, &env, &rules, &tx, Some(2));
        assert!(host.tick());
        assert!(host.tick());
        assert!(!host.tick());
        assert_eq!(host.steps(), 3);
    }

    #[test]
    fn test_unlimited_steps() {
        let mut state = JournaledState::new(WorldState::new());
        let env = Environment::default();
        let rules = ForkRuleset::standard().rules(Fork::Cancun);
        let tx = TxEnv::default();
        let mut host = Host::new(&mut state, &env, &rules, &tx, None);
        assert!((0..10_000).all(|_| host.tick()));
    }
}
