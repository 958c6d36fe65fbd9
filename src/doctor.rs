//! Environment diagnostics: which installations are visible, whether they
//! run, where artifacts land, and whether user configuration still carries
//! risky channel references.

use crate::compliance;
use crate::conda;
use crate::config::RunConfig;
use crate::exec::ExecService;

pub fn run_doctor(verbose: bool) {
    let version = env!("CARGO_PKG_VERSION");
    let svc = ExecService::default();
    let cfg = RunConfig::from_env();

    eprintln!("forgeshift doctor");
    eprintln!();
    eprintln!("  version: v{}", version);
    eprintln!(
        "  host:    {} / {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    if verbose {
        eprintln!("  build:   {} ({})", env!("FORGESHIFT_BUILD_DATE"), env!("FORGESHIFT_BUILD_PROFILE"));
        eprintln!("  rustc:   {}", env!("FORGESHIFT_BUILD_RUSTC"));
    }
    eprintln!();

    for (side, found) in [
        ("legacy", conda::discover_legacy()),
        ("target", conda::discover_target()),
    ] {
        match found {
            Some(inst) => {
                eprintln!("  {side} root:   {}", inst.root.display());
                eprintln!("  {side} binary: {}", inst.binary.display());
                match inst.version(&svc) {
                    Some(v) => eprintln!("  {side} version: {}", v),
                    None => {
                        if inst.present() {
                            eprintln!("  {side} version: not runnable (broken prefix)");
                        } else {
                            eprintln!("  {side} version: not present");
                        }
                    }
                }
            }
            None => eprintln!("  {side}: not found"),
        }
        eprintln!();
    }

    eprintln!("  trusted channel: {}", cfg.trusted_channel);
    eprintln!("  sentinels:       {}", cfg.sentinels.join(", "));
    eprintln!("  export root:     {}", cfg.export_root.display());
    eprintln!("  backup root:     {}", cfg.backup_root.display());
    eprintln!();

    // Compliance scan of the user's channel configuration
    let condarc = home::home_dir().map(|h| h.join(".condarc"));
    match condarc.as_ref().and_then(|p| std::fs::read_to_string(p).ok()) {
        Some(text) => {
            let tokens = compliance::find_risky_tokens(&text);
            if tokens.is_empty() {
                eprintln!("  .condarc: clean");
            } else {
                eprintln!("  .condarc: risky tokens present: {}", tokens.join(", "));
            }
        }
        None => eprintln!("  .condarc: none"),
    }

    eprintln!();
    eprintln!("doctor: completed diagnostics.");
}
