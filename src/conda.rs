//! Conda installation handles and the command surface the migration drives.
//!
//! Legacy (Anaconda-style) and target (Miniforge-style) installations are two
//! values of the same type; every mutation goes through the target, every
//! export/list through whichever side the caller holds. A "broken prefix" is
//! an installation whose binary exists on disk but cannot execute; callers
//! must distinguish that from an installation with zero environments.

use std::path::{Path, PathBuf};

use anyhow::Result;
use which::which;

use crate::exec::{ExecOutput, ExecRequest, ExecService};

/// Package installed during a repair attempt to restore a broken interpreter.
pub const INTERPRETER_PACKAGE: &str = "python";

/// The root environment; never migrated, never removed.
pub const BASE_ENV: &str = "base";

#[derive(Debug, Clone)]
pub struct CondaInstall {
    /// "legacy" or "target"; used in messages only.
    pub label: String,
    pub root: PathBuf,
    pub binary: PathBuf,
}

impl CondaInstall {
    pub fn new(label: &str, root: PathBuf, binary: PathBuf) -> Self {
        Self {
            label: label.to_string(),
            root,
            binary,
        }
    }

    /// Present on disk (root and binary exist), runnable or not.
    pub fn present(&self) -> bool {
        self.root.is_dir() && self.binary.is_file()
    }

    /// True when the binary answers `--version`. A present-but-unrunnable
    /// installation is the broken-prefix case.
    pub fn runnable(&self, svc: &ExecService) -> bool {
        svc.run(ExecRequest::new(&self.binary).arg("--version"))
            .map(|o| o.success())
            .unwrap_or(false)
    }

    pub fn version(&self, svc: &ExecService) -> Option<String> {
        let out = svc
            .run(ExecRequest::new(&self.binary).arg("--version"))
            .ok()?;
        if out.success() {
            Some(out.stdout.trim().to_string())
        } else {
            None
        }
    }

    /// `env list` raw output; the catalog layer parses it.
    pub fn env_list(&self, svc: &ExecService) -> Result<ExecOutput> {
        svc.run(ExecRequest::new(&self.binary).args(["env", "list"]))
    }

    /// `env export -n <name> --no-builds`; declaration text arrives on stdout.
    pub fn env_export(&self, svc: &ExecService, name: &str) -> Result<ExecOutput> {
        svc.run(
            ExecRequest::new(&self.binary)
                .args(["env", "export", "-n"])
                .arg(name)
                .arg("--no-builds"),
        )
    }

    /// `env create -f <file> -n <name> -c <channel> --override-channels`.
    /// `--override-channels` defends against risky channels baked into the
    /// installation's own configuration.
    pub fn env_create(
        &self,
        svc: &ExecService,
        file: &Path,
        name: &str,
        channel: &str,
    ) -> Result<ExecOutput> {
        svc.run(
            ExecRequest::new(&self.binary)
                .args(["env", "create", "-f"])
                .arg(file)
                .arg("-n")
                .arg(name)
                .arg("-c")
                .arg(channel)
                .arg("--override-channels"),
        )
    }

    pub fn env_remove(&self, svc: &ExecService, name: &str) -> Result<ExecOutput> {
        svc.run(
            ExecRequest::new(&self.binary)
                .args(["env", "remove", "-n"])
                .arg(name)
                .arg("-y"),
        )
    }

    /// `run -n <name> <cmd...>`, the substrate of the runnability probe.
    pub fn run_in(&self, svc: &ExecService, name: &str, cmd: &[&str]) -> Result<ExecOutput> {
        svc.run(
            ExecRequest::new(&self.binary)
                .args(["run", "-n"])
                .arg(name)
                .args(cmd.iter().copied()),
        )
    }

    /// `install -n <name> -c <channel> python -y`, the one-shot repair.
    pub fn install_interpreter(
        &self,
        svc: &ExecService,
        name: &str,
        channel: &str,
    ) -> Result<ExecOutput> {
        svc.run(
            ExecRequest::new(&self.binary)
                .args(["install", "-n"])
                .arg(name)
                .arg("-c")
                .arg(channel)
                .arg(INTERPRETER_PACKAGE)
                .arg("-y"),
        )
    }
}

fn env_binary(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn install_from_binary(label: &str, binary: PathBuf) -> CondaInstall {
    // <root>/bin/conda or <root>/condabin/conda; fall back to the parent dir
    let root = binary
        .parent()
        .and_then(|bin_dir| bin_dir.parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| binary.clone());
    CondaInstall::new(label, root, binary)
}

fn candidate_roots(names: &[&str]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(h) = home::home_dir() {
        for n in names {
            out.push(h.join(n));
        }
    }
    for n in names {
        out.push(PathBuf::from("/opt").join(n));
    }
    out
}

fn discover_install(label: &str, env_var: &str, root_names: &[&str]) -> Option<CondaInstall> {
    if let Some(bin) = env_binary(env_var) {
        return Some(install_from_binary(label, bin));
    }
    for root in candidate_roots(root_names) {
        let bin = root.join("bin").join("conda");
        if bin.is_file() {
            return Some(CondaInstall::new(label, root, bin));
        }
    }
    None
}

/// Locate the commercially-licensed installation being migrated away from.
pub fn discover_legacy() -> Option<CondaInstall> {
    discover_install(
        "legacy",
        "FORGESHIFT_LEGACY_BIN",
        &["anaconda3", "miniconda3", "anaconda2"],
    )
}

/// Locate the community-maintained replacement installation.
pub fn discover_target() -> Option<CondaInstall> {
    if let Some(found) = discover_install(
        "target",
        "FORGESHIFT_TARGET_BIN",
        &["miniforge3", "mambaforge"],
    ) {
        return Some(found);
    }
    // Last resort: a conda on PATH whose prefix looks community-maintained
    if let Ok(bin) = which("conda") {
        let s = bin.display().to_string();
        if s.contains("miniforge") || s.contains("mambaforge") {
            return Some(install_from_binary("target", bin));
        }
    }
    None
}
