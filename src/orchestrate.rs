//! Migration orchestrator.
//!
//! Drives, per environment, the existing-check → export → sanitize → create →
//! verify → repair/recreate sequence, strictly sequentially, and accumulates
//! one outcome per environment. A single environment's failure never halts the
//! run; only an unusable target installation is fatal. All accounting lives in
//! the returned `RunReport` value, so several runs can share one process.
//!
//! Bounds: at most 2 create attempts and 2 verify attempts per environment,
//! and at most one interpreter-repair per environment.

use std::fs::{self, OpenOptions};
use std::io::Write;

use serde::Serialize;

use crate::catalog::{self, Selection};
use crate::conda::{CondaInstall, BASE_ENV};
use crate::config::RunConfig;
use crate::errors::MigrateError;
use crate::exec::ExecService;
use crate::probe::{self, ProbeError};
use crate::sanitize;

const MAX_CREATE_ATTEMPTS: u32 = 2;
const MAX_VERIFY_ATTEMPTS: u32 = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeStatus {
    SkippedAlreadyValid,
    Repaired,
    Created,
    Recreated,
    Failed,
    MissingFromSource,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::SkippedAlreadyValid => "skipped-already-valid",
            OutcomeStatus::Repaired => "repaired",
            OutcomeStatus::Created => "created",
            OutcomeStatus::Recreated => "recreated",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::MissingFromSource => "missing-from-source",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnvOutcome {
    pub name: String,
    pub status: OutcomeStatus,
    /// Create/recreate attempts issued for this environment.
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<EnvOutcome>,
    pub warnings: Vec<String>,
}

impl RunReport {
    /// A run succeeds when no environment ended in `failed`.
    pub fn success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status != OutcomeStatus::Failed)
    }
}

/// One entry of the pre-removal verification gate.
#[derive(Debug, Serialize)]
pub struct GateEntry {
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct GateReport {
    pub entries: Vec<GateEntry>,
}

impl GateReport {
    pub fn all_ok(&self) -> bool {
        self.entries.iter().all(|e| e.ok)
    }
}

pub struct Orchestrator<'a> {
    pub cfg: &'a RunConfig,
    pub legacy: &'a CondaInstall,
    pub target: &'a CondaInstall,
    pub svc: ExecService,
}

impl<'a> Orchestrator<'a> {
    pub fn new(cfg: &'a RunConfig, legacy: &'a CondaInstall, target: &'a CondaInstall) -> Self {
        let svc = ExecService::new(cfg.timeout);
        Self {
            cfg,
            legacy,
            target,
            svc,
        }
    }

    /// Run the migration over a selection. Fatal only when an installation
    /// cannot be enumerated; everything per-environment lands in the report.
    pub fn run(&self, selection: &Selection) -> Result<RunReport, MigrateError> {
        let source = catalog::list_environments(self.legacy, &self.svc)?;
        let mut target_envs = catalog::list_environments(self.target, &self.svc)?;

        let resolved = selection.resolve(&source);
        let explicit = matches!(selection, Selection::Named(_));
        let mut report = RunReport::default();
        let use_err = crate::color_enabled_stderr();

        for name in &resolved.missing {
            report.warnings.push(format!(
                "'{name}' is not known to the legacy installation; skipping"
            ));
            report.outcomes.push(EnvOutcome {
                name: name.clone(),
                status: OutcomeStatus::MissingFromSource,
                attempts: 0,
                last_error: None,
            });
        }

        for name in &resolved.selected {
            if name == BASE_ENV {
                if explicit {
                    report
                        .warnings
                        .push("'base' is the root environment and is never migrated; skipping".to_string());
                }
                continue;
            }

            if self.cfg.dry_run {
                if target_envs.iter().any(|e| e == name) {
                    crate::log_info_stderr(
                        use_err,
                        &format!("plan: {name}: probe existing target environment, repair or recreate as needed"),
                    );
                } else {
                    crate::log_info_stderr(
                        use_err,
                        &format!("plan: {name}: export, sanitize, create, verify"),
                    );
                }
                continue;
            }

            let outcome = self.migrate_one(name, &mut target_envs);
            match outcome.status {
                OutcomeStatus::Failed => crate::log_error_stderr(
                    use_err,
                    &format!(
                        "{name}: failed after {} attempt(s): {}",
                        outcome.attempts,
                        outcome.last_error.as_deref().unwrap_or("unknown error")
                    ),
                ),
                status => crate::log_info_stderr(use_err, &format!("{name}: {}", status.as_str())),
            }
            report.outcomes.push(outcome);
        }

        for w in &report.warnings {
            crate::warn_print(w);
        }
        Ok(report)
    }

    /// The per-environment state machine.
    fn migrate_one(&self, name: &str, target_envs: &mut Vec<String>) -> EnvOutcome {
        let decl_path = self.cfg.declaration_path(name);
        let mut removed_existing = false;
        let mut repaired_interpreter = false;
        let mut create_attempts = 0u32;
        let mut verify_attempts = 0u32;

        let fail = |attempts: u32, err: MigrateError| EnvOutcome {
            name: name.to_string(),
            status: OutcomeStatus::Failed,
            attempts,
            last_error: Some(err.to_string()),
        };
        let done = |status: OutcomeStatus, attempts: u32| EnvOutcome {
            name: name.to_string(),
            status,
            attempts,
            last_error: None,
        };

        // ExistingCheck: a valid pre-existing target environment skips
        // export/sanitize/create entirely, which makes re-runs idempotent.
        if target_envs.iter().any(|e| e == name) {
            // Declaration from a previous run, when present, feeds the
            // sentinel step; without it the probe skips sentinels.
            let prior_decl = fs::read_to_string(&decl_path).ok();
            match probe::probe_environment(
                self.target,
                &self.svc,
                name,
                &self.cfg.sentinels,
                prior_decl.as_deref(),
            ) {
                Ok(()) => return done(OutcomeStatus::SkippedAlreadyValid, 0),
                Err(ProbeError::MissingInterpreter(_)) => {
                    repaired_interpreter = true;
                    if self.repair_interpreter(name) {
                        match probe::probe_environment(
                            self.target,
                            &self.svc,
                            name,
                            &self.cfg.sentinels,
                            prior_decl.as_deref(),
                        ) {
                            Ok(()) => return done(OutcomeStatus::Repaired, 0),
                            Err(_) => {}
                        }
                    }
                    // RepairFailed falls through to removal + full recreate.
                    if !self.remove_target_env(name, target_envs) {
                        return fail(
                            0,
                            MigrateError::RepairFailed {
                                name: name.to_string(),
                                detail: "interpreter reinstall did not restore runnability and removal failed"
                                    .to_string(),
                            },
                        );
                    }
                    removed_existing = true;
                }
                Err(ProbeError::Failed(_)) => {
                    if !self.remove_target_env(name, target_envs) {
                        return fail(
                            0,
                            MigrateError::VerifyFailed {
                                name: name.to_string(),
                                detail: "existing environment failed its probe and could not be removed"
                                    .to_string(),
                            },
                        );
                    }
                    removed_existing = true;
                }
            }
        }

        // Export from the legacy installation.
        if let Err(e) = self.export_declaration(name) {
            return fail(create_attempts, e);
        }

        // Sanitize in place; the exported file stays on disk as an audit artifact.
        if let Err(e) = sanitize::sanitize_file(&decl_path, self.cfg) {
            return fail(create_attempts, e);
        }

        // Create + verify with bounded retry.
        loop {
            create_attempts += 1;
            match self.create_env(name, create_attempts) {
                Ok(()) => {
                    if !target_envs.iter().any(|e| e == name) {
                        target_envs.push(name.to_string());
                    }
                }
                Err(e) => {
                    if create_attempts < MAX_CREATE_ATTEMPTS {
                        // Clear any partial state before the single retry.
                        let _ = self.remove_target_env(name, target_envs);
                        continue;
                    }
                    self.cleanup_after_failure(name, target_envs);
                    return fail(create_attempts, e);
                }
            }

            verify_attempts += 1;
            let decl_text = fs::read_to_string(&decl_path).ok();
            match probe::probe_environment(
                self.target,
                &self.svc,
                name,
                &self.cfg.sentinels,
                decl_text.as_deref(),
            ) {
                Ok(()) => {
                    let status = if removed_existing || create_attempts > 1 {
                        OutcomeStatus::Recreated
                    } else {
                        OutcomeStatus::Created
                    };
                    return done(status, create_attempts);
                }
                Err(ProbeError::MissingInterpreter(detail)) if !repaired_interpreter => {
                    repaired_interpreter = true;
                    if self.repair_interpreter(name)
                        && probe::probe_environment(
                            self.target,
                            &self.svc,
                            name,
                            &self.cfg.sentinels,
                            decl_text.as_deref(),
                        )
                        .is_ok()
                    {
                        let status = if removed_existing || create_attempts > 1 {
                            OutcomeStatus::Recreated
                        } else {
                            OutcomeStatus::Created
                        };
                        return done(status, create_attempts);
                    }
                    if create_attempts < MAX_CREATE_ATTEMPTS && verify_attempts < MAX_VERIFY_ATTEMPTS
                    {
                        let _ = self.remove_target_env(name, target_envs);
                        continue;
                    }
                    self.cleanup_after_failure(name, target_envs);
                    return fail(
                        create_attempts,
                        MigrateError::VerifyFailed {
                            name: name.to_string(),
                            detail,
                        },
                    );
                }
                Err(err) => {
                    if create_attempts < MAX_CREATE_ATTEMPTS && verify_attempts < MAX_VERIFY_ATTEMPTS
                    {
                        let _ = self.remove_target_env(name, target_envs);
                        continue;
                    }
                    self.cleanup_after_failure(name, target_envs);
                    return fail(
                        create_attempts,
                        MigrateError::VerifyFailed {
                            name: name.to_string(),
                            detail: err.detail().to_string(),
                        },
                    );
                }
            }
        }
    }

    fn export_declaration(&self, name: &str) -> Result<(), MigrateError> {
        let decl_path = self.cfg.declaration_path(name);
        if let Some(parent) = decl_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let out = self
            .legacy
            .env_export(&self.svc, name)
            .map_err(|e| MigrateError::ExportFailed {
                name: name.to_string(),
                exit: None,
                detail: e.to_string(),
            })?;
        if !out.success() {
            return Err(MigrateError::ExportFailed {
                name: name.to_string(),
                exit: out.exit_code(),
                detail: out.first_diagnostic_line(),
            });
        }
        fs::write(&decl_path, out.stdout.as_bytes())?;
        Ok(())
    }

    fn create_env(&self, name: &str, attempt: u32) -> Result<(), MigrateError> {
        let decl_path = self.cfg.declaration_path(name);
        let log_path = self.cfg.create_log_path(name);
        let out = match self
            .target
            .env_create(&self.svc, &decl_path, name, &self.cfg.trusted_channel)
        {
            Ok(o) => o,
            Err(e) => {
                // Spawn failure still gets a log entry for post-mortem.
                let _ = append_create_log(&log_path, attempt, "", &e.to_string());
                return Err(MigrateError::CreateFailed {
                    name: name.to_string(),
                    exit: None,
                    log: log_path.display().to_string(),
                });
            }
        };

        append_create_log(&log_path, attempt, &out.stdout, &out.stderr)?;
        if !out.success() {
            return Err(MigrateError::CreateFailed {
                name: name.to_string(),
                exit: out.exit_code(),
                log: log_path.display().to_string(),
            });
        }
        Ok(())
    }

    fn repair_interpreter(&self, name: &str) -> bool {
        self.target
            .install_interpreter(&self.svc, name, &self.cfg.trusted_channel)
            .map(|o| o.success())
            .unwrap_or(false)
    }

    fn remove_target_env(&self, name: &str, target_envs: &mut Vec<String>) -> bool {
        let ok = self
            .target
            .env_remove(&self.svc, name)
            .map(|o| o.success())
            .unwrap_or(false);
        if ok {
            target_envs.retain(|e| e != name);
        }
        ok
    }

    /// Apply the cleanup policy to a partially-created environment after a
    /// terminal failure.
    fn cleanup_after_failure(&self, name: &str, target_envs: &mut Vec<String>) {
        let question = format!("remove partially-created environment '{name}'?");
        if self
            .cfg
            .remove_on_failure
            .decide(&question, self.cfg.confirm.as_ref())
        {
            let _ = self.remove_target_env(name, target_envs);
        }
    }

    /// Pre-removal verification gate: every non-base legacy environment must
    /// have a target counterpart that independently passes the probe.
    /// `EnumerationUnavailable` when the legacy catalog cannot be listed: the
    /// gate cannot assert correctness, and proceeding is an explicit override
    /// outside this tool.
    pub fn verify_all_migrated(&self) -> Result<GateReport, MigrateError> {
        let source = catalog::list_environments(self.legacy, &self.svc)?;
        let target_envs = catalog::list_environments(self.target, &self.svc)?;

        let mut report = GateReport::default();
        for name in source.iter().filter(|n| n.as_str() != BASE_ENV) {
            if !target_envs.iter().any(|e| e == name) {
                report.entries.push(GateEntry {
                    name: name.clone(),
                    ok: false,
                    detail: Some("no corresponding target environment".to_string()),
                });
                continue;
            }
            let decl_text = fs::read_to_string(self.cfg.declaration_path(name)).ok();
            match probe::probe_environment(
                self.target,
                &self.svc,
                name,
                &self.cfg.sentinels,
                decl_text.as_deref(),
            ) {
                Ok(()) => report.entries.push(GateEntry {
                    name: name.clone(),
                    ok: true,
                    detail: None,
                }),
                Err(e) => report.entries.push(GateEntry {
                    name: name.clone(),
                    ok: false,
                    detail: Some(e.detail().to_string()),
                }),
            }
        }
        Ok(report)
    }
}

fn append_create_log(
    log_path: &std::path::Path,
    attempt: u32,
    stdout: &str,
    stderr: &str,
) -> std::io::Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(log_path)?;
    writeln!(f, "=== create attempt {attempt} ===")?;
    if !stdout.is_empty() {
        writeln!(f, "{stdout}")?;
    }
    if !stderr.is_empty() {
        writeln!(f, "--- stderr ---")?;
        writeln!(f, "{stderr}")?;
    }
    Ok(())
}

/// Human-readable trailing summary: one line per environment, then a verdict.
pub fn print_summary(report: &RunReport) {
    let use_err = crate::color_enabled_stderr();
    eprintln!();
    eprintln!("migration summary:");
    for o in &report.outcomes {
        let line = match &o.last_error {
            Some(err) => format!("  {:<24} {}  ({err})", o.name, o.status.as_str()),
            None => format!("  {:<24} {}", o.name, o.status.as_str()),
        };
        if o.status == OutcomeStatus::Failed {
            crate::log_error_stderr(use_err, &line);
        } else {
            eprintln!("{line}");
        }
    }
    if report.success() {
        crate::log_info_stderr(use_err, "all selected environments migrated or already valid");
    } else {
        crate::log_error_stderr(
            use_err,
            "some environments failed; re-run after fixing (already-valid ones are skipped)",
        );
    }
}
