//! Run configuration: artifact roots, trusted channel, sentinel list,
//! cleanup policy, and the optional per-step deadline.
//!
//! Environment overrides (all optional):
//! - FORGESHIFT_EXPORT_ROOT: where exported declarations and create logs land
//! - FORGESHIFT_BACKUP_ROOT: first-write-wins backup location
//! - FORGESHIFT_CHANNEL: trusted channel name (default conda-forge)
//! - FORGESHIFT_SENTINELS: comma-separated sentinel dependency list
//! - FORGESHIFT_LEGACY_BIN / FORGESHIFT_TARGET_BIN: explicit binary paths

use std::path::PathBuf;
use std::time::Duration;

/// Default single approved package source retained after sanitization.
pub const DEFAULT_TRUSTED_CHANNEL: &str = "conda-forge";

/// Suffix for exported declaration files: `<export-root>/<name>.forgeshift.yml`.
pub const DECLARATION_SUFFIX: &str = "forgeshift.yml";

fn sentinels_default() -> Vec<&'static str> {
    vec!["aiohttp"]
}

/// Parse CSV environment override or return defaults.
pub fn parse_csv_env(name: &str, default: Vec<&str>) -> Vec<String> {
    match std::env::var(name) {
        Ok(v) => {
            let s = v.trim();
            if s.is_empty() {
                default.into_iter().map(|x| x.to_string()).collect()
            } else {
                s.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            }
        }
        Err(_) => default.into_iter().map(|x| x.to_string()).collect(),
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn state_root() -> PathBuf {
    home::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".forgeshift")
}

/// Three-valued policy for a destructive decision point. `Ask` consults an
/// injected confirmation capability; without one it refuses.
#[derive(Copy, Clone, PartialEq, Eq, Debug, clap::ValueEnum)]
pub enum DecisionPolicy {
    Always,
    Never,
    Ask,
}

pub type ConfirmFn = Box<dyn Fn(&str) -> bool>;

impl DecisionPolicy {
    pub fn decide(&self, question: &str, confirm: Option<&ConfirmFn>) -> bool {
        match self {
            DecisionPolicy::Always => true,
            DecisionPolicy::Never => false,
            DecisionPolicy::Ask => confirm.map(|f| f(question)).unwrap_or(false),
        }
    }
}

/// One orchestrator run's configuration. Built once, passed by reference;
/// nothing here is process-global, so several runs can share a process.
pub struct RunConfig {
    pub trusted_channel: String,
    pub sentinels: Vec<String>,
    pub export_root: PathBuf,
    pub backup_root: PathBuf,
    /// Whether to remove a partially-created environment after terminal failure.
    pub remove_on_failure: DecisionPolicy,
    /// Per-step deadline; None = wait forever (package-manager default behavior).
    pub timeout: Option<Duration>,
    pub dry_run: bool,
    pub verbose: bool,
    pub confirm: Option<ConfirmFn>,
}

impl RunConfig {
    pub fn from_env() -> Self {
        let trusted_channel = std::env::var("FORGESHIFT_CHANNEL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_TRUSTED_CHANNEL.to_string());
        Self {
            trusted_channel,
            sentinels: parse_csv_env("FORGESHIFT_SENTINELS", sentinels_default()),
            export_root: env_path("FORGESHIFT_EXPORT_ROOT")
                .unwrap_or_else(|| state_root().join("exports")),
            backup_root: env_path("FORGESHIFT_BACKUP_ROOT")
                .unwrap_or_else(|| state_root().join("backups")),
            remove_on_failure: DecisionPolicy::Never,
            timeout: None,
            dry_run: false,
            verbose: false,
            confirm: None,
        }
    }

    /// Deterministic declaration path for an environment name.
    pub fn declaration_path(&self, name: &str) -> PathBuf {
        self.export_root.join(format!("{name}.{DECLARATION_SUFFIX}"))
    }

    /// Persistent per-environment create log, appended across attempts.
    pub fn create_log_path(&self, name: &str) -> PathBuf {
        self.export_root.join("logs").join(format!("create_{name}.log"))
    }
}
