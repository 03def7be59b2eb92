//! Scenario runner
//!
//! Every (scenario, fork) pair inside the scenario's range is an
//! independent job with its own world state. Jobs run on a rayon pool and
//! report into shared statistics.

use crate::chain::ChainIdSource;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::scenario::{Scenario, ScenarioInput};
use crate::verifier::{Mismatch, PostStateVerifier};
use bach_evm::{ExecutionEngine, Outcome};
use bach_forks::{Fork, ForkRuleset};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};

/// Result of one scenario on one fork
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Fork it ran on
    pub fork: Fork,
    /// Whether the post-state matched
    pub passed: bool,
    /// Execution outcome, `None` if setup failed
    #[serde(serialize_with = "serialize_outcome")]
    pub outcome: Option<Outcome>,
    /// Gas charged to the sender
    pub gas_used: u64,
    /// Execution stopped by a step or gas limit
    pub aborted: bool,
    /// Setup error or abort reason
    pub error: Option<String>,
    /// Post-state mismatches
    pub mismatches: Vec<Mismatch>,
}

impl ScenarioReport {
    fn setup_failed(name: &str, fork: Fork, error: String) -> Self {
        Self {
            name: name.to_string(),
            fork,
            passed: false,
            outcome: None,
            gas_used: 0,
            aborted: false,
            error: Some(error),
            mismatches: Vec::new(),
        }
    }

    /// `name [fork]`
    pub fn id(&self) -> String {
        format!("{} [{}]", self.name, self.fork)
    }

    /// One-line failure reason
    pub fn reason(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        self.mismatches
            .iter()
            .map(Mismatch::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn serialize_outcome<S: Serializer>(outcome: &Option<Outcome>, s: S) -> Result<S::Ok, S::Error> {
    match outcome {
        Some(outcome) => s.serialize_some(&outcome.to_string()),
        None => s.serialize_none(),
    }
}

/// Run statistics
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Scenario runs executed
    pub total: usize,
    /// Runs passed
    pub passed: usize,
    /// Runs failed
    pub failed: usize,
    /// (scenario, fork) pairs outside the scenario's range
    pub skipped: usize,
    /// Total execution time
    pub duration: Duration,
    /// Failed runs with reasons
    pub failures: Vec<(String, String)>,
}

impl RunStats {
    /// Create empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one report
    pub fn record(&mut self, report: &ScenarioReport) {
        self.total += 1;
        if report.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
            self.failures.push((report.id(), report.reason()));
        }
    }

    /// Pass rate as percentage
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.passed as f64 / self.total as f64) * 100.0
    }

    /// Whether every executed run passed
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Print summary
    pub fn print_summary(&self) {
        println!("\n========================================");
        println!("State Test Summary");
        println!("========================================");
        println!("Total:   {}", self.total);
        println!("Passed:  {}", self.passed);
        println!("Failed:  {}", self.failed);
        println!("Skipped: {}", self.skipped);
        println!("Pass Rate: {:.2}%", self.pass_rate());
        println!("Duration: {:.2}s", self.duration.as_secs_f64());

        if !self.failures.is_empty() {
            println!("\nFailed scenarios:");
            for (name, reason) in &self.failures {
                println!("  - {}: {}", name, reason);
            }
        }
    }
}

/// Statistics plus per-run reports sorted by scenario name then fork
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Aggregate statistics
    pub stats: RunStats,
    /// Individual reports
    pub reports: Vec<ScenarioReport>,
}

/// Runs scenarios across forks
pub struct Runner {
    engine: ExecutionEngine<'static>,
    ruleset: &'static ForkRuleset,
    forks: Vec<Fork>,
    chain: Arc<dyn ChainIdSource>,
    threads: usize,
    filter: Option<String>,
}

impl Runner {
    /// Runner configured from `config`
    pub fn new(config: &HarnessConfig) -> Self {
        let ruleset = ForkRuleset::standard();
        Self {
            engine: ExecutionEngine::with_ruleset(ruleset, config.engine_config()),
            ruleset,
            forks: config.forks.clone(),
            chain: config.chain_source(),
            threads: config.threads,
            filter: config.filter.clone(),
        }
    }

    /// Run one scenario on one fork
    pub fn run_one(&self, scenario: &Scenario, fork: Fork) -> ScenarioReport {
        let _span = info_span!("scenario", name = scenario.name(), %fork).entered();
        let rules = self.ruleset.rules(fork);
        let input = ScenarioInput {
            fork,
            rules: &rules,
            chain_id: self.chain.chain_id(),
        };

        let spec = match scenario.build(&input) {
            Ok(spec) => spec,
            Err(e) => {
                let report =
                    ScenarioReport::setup_failed(scenario.name(), fork, format!("setup: {e}"));
                warn!("FAIL: {}: {}", report.id(), report.reason());
                return report;
            }
        };

        let result = self.engine.execute(&spec.pre, &spec.env, &spec.tx, fork);
        debug!(outcome = %result.outcome, gas_used = result.gas_used, "executed");

        let (mismatches, error) = if result.aborted {
            let reason = result
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default();
            (Vec::new(), Some(format!("aborted: {reason}")))
        } else {
            (PostStateVerifier.verify(&spec.post, &result.post_state), None)
        };

        let report = ScenarioReport {
            name: scenario.name().to_string(),
            fork,
            passed: error.is_none() && mismatches.is_empty(),
            outcome: Some(result.outcome),
            gas_used: result.gas_used,
            aborted: result.aborted,
            error,
            mismatches,
        };
        if report.passed {
            info!("PASS: {}", report.id());
        } else {
            warn!("FAIL: {}: {}", report.id(), report.reason());
        }
        report
    }

    /// Run every scenario on every configured fork inside its range
    pub fn run(&self, scenarios: &[Scenario]) -> HarnessResult<RunSummary> {
        let start = Instant::now();
        let mut jobs = Vec::new();
        let mut skipped = 0;
        for scenario in scenarios {
            if let Some(filter) = &self.filter {
                if !scenario.name().contains(filter.as_str()) {
                    continue;
                }
            }
            for &fork in &self.forks {
                if scenario.applies_to(fork) {
                    jobs.push((scenario, fork));
                } else {
                    skipped += 1;
                }
            }
        }
        info!(jobs = jobs.len(), skipped, "running scenarios");

        let stats = Mutex::new(RunStats {
            skipped,
            ..RunStats::new()
        });
        let execute = || -> Vec<ScenarioReport> {
            jobs.par_iter()
                .map(|(scenario, fork)| {
                    let report = self.run_one(scenario, *fork);
                    stats.lock().record(&report);
                    report
                })
                .collect()
        };

        let mut reports = if self.threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .build()
                .map_err(|e| HarnessError::Config(e.to_string()))?
                .install(execute)
        } else {
            execute()
        };
        reports.sort_by(|a, b| a.name.cmp(&b.name).then(a.fork.cmp(&b.fork)));

        let mut stats = stats.into_inner();
        stats.failures.sort();
        stats.duration = start.elapsed();
        Ok(RunSummary { stats, reports })
    }
}
