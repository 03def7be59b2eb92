//! CLI argument parsing for bach-statetest

use bach_forks::Fork;
use bach_harness::HarnessConfig;
use clap::Parser;
use std::path::PathBuf;

/// State-transition test runner
#[derive(Parser, Debug, Clone)]
#[command(name = "bach-statetest")]
#[command(about = "Run state-transition scenarios across forks")]
#[command(version)]
pub struct Cli {
    /// Harness configuration file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Forks to run (comma-separated); defaults to the config's list
    #[arg(long, value_delimiter = ',')]
    pub fork: Vec<Fork>,

    /// JSON fixture files to run in addition to the built-in suite
    #[arg(long, num_args = 1..)]
    pub fixtures: Vec<PathBuf>,

    /// Skip the built-in scenario suite
    #[arg(long)]
    pub no_builtin: bool,

    /// Only run scenarios whose name contains this
    #[arg(long)]
    pub filter: Option<String>,

    /// Worker threads (0 uses one per core)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Abort a scenario after this many instructions
    #[arg(long)]
    pub max_steps: Option<u64>,

    /// Abort a scenario whose gas limit exceeds this
    #[arg(long)]
    pub gas_ceiling: Option<u64>,

    /// Chain id when no remote node is configured
    #[arg(long)]
    pub chain_id: Option<u64>,

    /// Write per-scenario reports to this file (JSON)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply command-line overrides on top of `config`
    pub fn apply(&self, config: &mut HarnessConfig) {
        if !self.fork.is_empty() {
            config.forks = self.fork.clone();
        }
        config.fixtures.extend(self.fixtures.iter().cloned());
        if self.no_builtin {
            config.builtin = false;
        }
        if let Some(filter) = &self.filter {
            config.filter = Some(filter.clone());
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = Some(max_steps);
        }
        if let Some(gas_ceiling) = self.gas_ceiling {
            config.gas_ceiling = Some(gas_ceiling);
        }
        if let Some(chain_id) = self.chain_id {
            config.chain_id = chain_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["bach-statetest"]);
        assert!(cli.config.is_none());
        assert!(cli.fork.is_empty());
        assert!(cli.fixtures.is_empty());
        assert!(!cli.no_builtin);
        assert_eq!(cli.log_level, "info");
        assert!(!cli.json_logs);

        let mut config = HarnessConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_cli_custom_values() {
        let cli = Cli::parse_from([
            "bach-statetest",
            "--config", "/path/to/harness.json",
            "--fork", "Berlin,Merge",
            "--fixtures", "a.json", "b.json",
            "--no-builtin",
            "--filter", "stack",
            "--threads", "4",
            "--max-steps", "1000",
            "--gas-ceiling", "500000",
            "--chain-id", "1337",
            "--log-level", "debug",
            "--json-logs",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/harness.json")));
        assert_eq!(cli.fork, vec![Fork::Berlin, Fork::Paris]);
        assert_eq!(cli.fixtures.len(), 2);
        assert!(cli.json_logs);

        let mut config = HarnessConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.forks, vec![Fork::Berlin, Fork::Paris]);
        assert!(!config.builtin);
        assert_eq!(config.filter.as_deref(), Some("stack"));
        assert_eq!(config.threads, 4);
        assert_eq!(config.max_steps, Some(1000));
        assert_eq!(config.gas_ceiling, Some(500_000));
        assert_eq!(config.chain_id, 1337);
    }

    #[test]
    fn test_cli_rejects_unknown_fork() {
        assert!(Cli::try_parse_from(["bach-statetest", "--fork", "Olympic"]).is_err());
    }
}
