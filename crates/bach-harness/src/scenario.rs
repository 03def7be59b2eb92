//! Scenario definitions
//!
//! A scenario is a named builder function plus the fork range it is valid
//! for. The builder is called once per fork and returns plain data.

use crate::error::SetupResult;
use crate::verifier::ExpectedPostState;
use bach_forks::{Fork, ForkRange, ForkRules};
use bach_types::{Environment, SignedTransaction, WorldState};
use std::fmt;
use std::sync::Arc;

/// What a scenario builder is given
#[derive(Clone, Copy, Debug)]
pub struct ScenarioInput<'a> {
    /// Fork being run
    pub fork: Fork,
    /// Rules of that fork
    pub rules: &'a ForkRules,
    /// Chain id the scenario runs on
    pub chain_id: u64,
}

/// A fully built scenario, ready to execute
#[derive(Clone, Debug)]
pub struct ScenarioSpec {
    /// Block context
    pub env: Environment,
    /// Pre-state
    pub pre: WorldState,
    /// Transaction to execute
    pub tx: SignedTransaction,
    /// Expected post-state
    pub post: ExpectedPostState,
}

type BuildFn = dyn Fn(&ScenarioInput<'_>) -> SetupResult<ScenarioSpec> + Send + Sync;

/// Named scenario valid over a fork range
#[derive(Clone)]
pub struct Scenario {
    name: String,
    range: ForkRange,
    build: Arc<BuildFn>,
}

impl Scenario {
    /// Scenario `name` valid for `range`
    pub fn new<F>(name: impl Into<String>, range: ForkRange, build: F) -> Self
    where
        F: Fn(&ScenarioInput<'_>) -> SetupResult<ScenarioSpec> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            range,
            build: Arc::new(build),
        }
    }

    /// Scenario name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Forks the scenario is valid for
    pub fn range(&self) -> ForkRange {
        self.range
    }

    /// Whether the scenario is scheduled on `fork`
    pub fn applies_to(&self, fork: Fork) -> bool {
        self.range.contains(fork)
    }

    /// Build the scenario for one fork
    pub fn build(&self, input: &ScenarioInput<'_>) -> SetupResult<ScenarioSpec> {
        (self.build)(input)
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}
