//! Configuration loading from pairpipe.toml
//!
//! Configuration can be specified in a `pairpipe.toml` file in the project root.
//! The configuration is automatically discovered by walking up from the current directory.
//! Command-line flags override anything set here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up during discovery
pub const CONFIG_FILE_NAME: &str = "pairpipe.toml";

/// pairpipe configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PairpipeConfig {
    /// Runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Isolation mode for workers
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationMode {
    /// Run each worker in a separate process (default)
    #[default]
    Process,
    /// Run workers as threads of the orchestrator (no address-space isolation)
    Thread,
}

impl IsolationMode {
    /// Whether this mode provides process isolation
    pub fn is_isolated(self) -> bool {
        matches!(self, IsolationMode::Process)
    }
}

/// What a failed wait on a worker handle does to the run.
///
/// Every handle is waited on in either case; the policy only decides the
/// result once the wait phase has drained.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum WaitPolicy {
    /// Report the failure and carry on (default)
    #[default]
    Report,
    /// Report the failure and fail the run after the wait phase
    Fail,
}

/// Runner configuration for orchestration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Isolation mode: "process" or "thread"
    #[serde(default)]
    pub isolation: IsolationMode,
    /// Wait failure policy: "report" or "fail"
    #[serde(default)]
    pub wait_failures: WaitPolicy,
    /// Pair count used by `pairs` when none is given
    #[serde(default = "default_pairs")]
    pub pairs: i64,
    /// Binary to start worker processes from (defaults to the running executable)
    #[serde(default)]
    pub worker_binary: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            isolation: IsolationMode::default(),
            wait_failures: WaitPolicy::default(),
            pairs: default_pairs(),
            worker_binary: None,
        }
    }
}

fn default_pairs() -> i64 {
    3
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "pairpipe=info".to_string()
}

impl PairpipeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        Self::discover_from(std::env::current_dir().ok()?)
    }

    /// Walk up from `dir` looking for [`CONFIG_FILE_NAME`]
    pub fn discover_from(mut dir: PathBuf) -> Option<Self> {
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!(path = %config_path.display(), error = %e, "ignoring unreadable config");
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# pairpipe Configuration

[runner]
# Isolation mode: "process" or "thread"
isolation = "process"
# What a failed wait does: "report" (carry on) or "fail" (fail the run after waiting)
wait_failures = "report"
# Pair count for `pairpipe pairs` when no count is given
pairs = 3
# Binary to start worker processes from (uncomment to override)
# worker_binary = "/usr/local/bin/pairpipe"

[logging]
# tracing filter, used when RUST_LOG is not set
filter = "pairpipe=info"
"#
        .to_string()
    }
}
