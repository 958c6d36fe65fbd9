use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use forgeshift::catalog::Selection;
use forgeshift::orchestrate::Orchestrator;
use forgeshift::{
    catalog, exit_code_for_migrate_error, sanitize, ColorMode, CondaInstall, DecisionPolicy,
    ExecService, MigrateError, RunConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "forgeshift",
    version,
    about = "Migrate an Anaconda installation to Miniforge/conda-forge: recreate environments under the community installation and verify they run."
)]
struct Cli {
    /// Colorize output: auto|always|never
    #[arg(long, value_enum, global = true)]
    color: Option<ColorMode>,

    /// Print detailed execution info
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run diagnostics to check installations and configuration
    Doctor,
    /// Recreate legacy environments under the target installation
    Migrate {
        /// Migrate every environment the legacy installation reports
        #[arg(long)]
        all: bool,
        /// Explicit comma/space-separated environment names
        #[arg(long)]
        envs: Option<String>,
        /// Print planned actions without creating or removing anything
        #[arg(long = "dry-run")]
        dry_run: bool,
        /// Remove a partially-created environment after terminal failure
        #[arg(long = "remove-on-failure", value_enum, default_value = "never")]
        remove_on_failure: DecisionPolicy,
        /// Per-command deadline in seconds (0 or unset = wait forever)
        #[arg(long = "timeout-secs")]
        timeout_secs: Option<u64>,
        /// Emit a machine-readable JSON summary
        #[arg(long)]
        json: bool,
    },
    /// List environments known to the legacy and/or target installation
    List {
        /// Legacy installation only
        #[arg(long)]
        source: bool,
        /// Target installation only
        #[arg(long)]
        target: bool,
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Sanitize a declaration file in place (backup, rewrite, verify)
    Sanitize {
        /// Declaration file to rewrite
        file: PathBuf,
    },
    /// Pre-removal gate: every non-base legacy environment must pass its probe
    /// under the target installation
    Verify {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
}

fn require_legacy() -> Result<CondaInstall, MigrateError> {
    forgeshift::discover_legacy().ok_or_else(|| MigrateError::EnumerationUnavailable {
        installation: "legacy".to_string(),
        detail: "no legacy installation found (set FORGESHIFT_LEGACY_BIN to override)".to_string(),
    })
}

fn require_target() -> Result<CondaInstall, MigrateError> {
    forgeshift::discover_target().ok_or_else(|| MigrateError::EnumerationUnavailable {
        installation: "target".to_string(),
        detail: "no target installation found; install Miniforge first (or set FORGESHIFT_TARGET_BIN)"
            .to_string(),
    })
}

fn timeout_from(secs: Option<u64>) -> Option<Duration> {
    match secs {
        None | Some(0) => None,
        Some(n) => Some(Duration::from_secs(n)),
    }
}

fn cmd_migrate(
    all: bool,
    envs: Option<String>,
    dry_run: bool,
    remove_on_failure: DecisionPolicy,
    timeout_secs: Option<u64>,
    json: bool,
    verbose: bool,
) -> Result<ExitCode, MigrateError> {
    let use_err = forgeshift::color_enabled_stderr();
    let selection = match (all, envs) {
        (true, None) => Selection::All,
        (false, Some(list)) => Selection::parse_named(&list),
        _ => {
            forgeshift::log_error_stderr(use_err, "specify exactly one of --all or --envs <list>");
            return Ok(ExitCode::from(2));
        }
    };

    let legacy = require_legacy()?;
    let target = require_target()?;

    let mut cfg = RunConfig::from_env();
    cfg.remove_on_failure = remove_on_failure;
    cfg.timeout = timeout_from(timeout_secs);
    cfg.dry_run = dry_run;
    cfg.verbose = verbose;
    if remove_on_failure == DecisionPolicy::Ask {
        cfg.confirm = Some(Box::new(forgeshift::confirm));
    }

    // Single-writer: one migration per target installation at a time.
    let _lock = if dry_run {
        None
    } else {
        Some(forgeshift::acquire_lock(&target.root).map_err(MigrateError::Io)?)
    };

    let orch = Orchestrator::new(&cfg, &legacy, &target);
    let report = orch.run(&selection)?;

    if dry_run {
        return Ok(ExitCode::SUCCESS);
    }
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    }
    forgeshift::print_summary(&report);
    Ok(if report.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn cmd_list(source: bool, target: bool, json: bool) -> Result<ExitCode, MigrateError> {
    let both = source == target; // neither flag or both = show both sides
    let svc = ExecService::default();
    let mut sides: Vec<(&str, CondaInstall)> = Vec::new();
    if both || source {
        sides.push(("source", require_legacy()?));
    }
    if both || target {
        sides.push(("target", require_target()?));
    }

    let mut out = serde_json::Map::new();
    for (label, inst) in &sides {
        let names = catalog::list_environments(inst, &svc)?;
        if json {
            out.insert(
                (*label).to_string(),
                serde_json::Value::Array(
                    names.into_iter().map(serde_json::Value::String).collect(),
                ),
            );
        } else {
            println!("{label} ({}):", inst.root.display());
            for n in names {
                println!("  {n}");
            }
        }
    }
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::Value::Object(out))
                .unwrap_or_else(|_| "{}".to_string())
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_sanitize(file: &Path) -> Result<ExitCode, MigrateError> {
    let cfg = RunConfig::from_env();
    sanitize::sanitize_file(file, &cfg)?;
    let use_err = forgeshift::color_enabled_stderr();
    forgeshift::log_info_stderr(use_err, &format!("sanitized {}", file.display()));
    Ok(ExitCode::SUCCESS)
}

fn cmd_verify(json: bool) -> Result<ExitCode, MigrateError> {
    let legacy = require_legacy()?;
    let target = require_target()?;
    let cfg = RunConfig::from_env();
    let orch = Orchestrator::new(&cfg, &legacy, &target);
    let report = orch.verify_all_migrated()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        for e in &report.entries {
            match &e.detail {
                Some(d) => println!("{:<24} {}  ({d})", e.name, if e.ok { "ok" } else { "FAIL" }),
                None => println!("{:<24} {}", e.name, if e.ok { "ok" } else { "FAIL" }),
            }
        }
    }
    let use_err = forgeshift::color_enabled_stderr();
    if report.all_ok() {
        forgeshift::log_info_stderr(use_err, "verification gate passed: legacy installation may be retired");
        Ok(ExitCode::SUCCESS)
    } else {
        forgeshift::log_error_stderr(use_err, "verification gate failed: do not retire the legacy installation");
        Ok(ExitCode::from(1))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(mode) = cli.color {
        forgeshift::set_color_mode(mode);
    }

    let result = match cli.command {
        Cmd::Doctor => {
            forgeshift::doctor::run_doctor(cli.verbose);
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Migrate {
            all,
            envs,
            dry_run,
            remove_on_failure,
            timeout_secs,
            json,
        } => cmd_migrate(
            all,
            envs,
            dry_run,
            remove_on_failure,
            timeout_secs,
            json,
            cli.verbose,
        ),
        Cmd::List {
            source,
            target,
            json,
        } => cmd_list(source, target, json),
        Cmd::Sanitize { file } => cmd_sanitize(&file),
        Cmd::Verify { json } => cmd_verify(json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            let use_err = forgeshift::color_enabled_stderr();
            forgeshift::log_error_stderr(use_err, &format!("forgeshift: {e}"));
            ExitCode::from(exit_code_for_migrate_error(&e))
        }
    }
}
