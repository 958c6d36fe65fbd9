#![cfg(unix)]
mod common;

use forgeshift::catalog::Selection;
use forgeshift::orchestrate::{Orchestrator, OutcomeStatus};

#[test]
fn fresh_environments_are_exported_sanitized_created_and_verified() {
    let dir = tempfile::tempdir().expect("tempdir");
    let legacy = common::stub_legacy(dir.path(), &["ml", "web"]);
    let target = common::stub_target(dir.path());
    let cfg = common::test_cfg(dir.path());

    let orch = Orchestrator::new(&cfg, &legacy.install, &target.install);
    let report = orch.run(&Selection::All).expect("run");

    assert!(report.success());
    assert_eq!(report.outcomes.len(), 2);
    for o in &report.outcomes {
        assert_eq!(o.status, OutcomeStatus::Created, "{}: {:?}", o.name, o);
        assert_eq!(o.attempts, 1);
    }

    // base is never exported, created, or removed
    for line in legacy.calls().iter().chain(target.calls().iter()) {
        assert!(!line.contains("-n base"), "base leaked into: {line}");
    }

    // declarations are retained on disk, sanitized
    for name in ["ml", "web"] {
        let decl = std::fs::read_to_string(cfg.declaration_path(name)).expect("declaration");
        assert!(decl.contains("channels:\n  - conda-forge\n"), "{decl}");
        assert!(!decl.contains("defaults"), "{decl}");
        assert!(!decl.lines().any(|l| l.starts_with("prefix:")), "{decl}");
        assert!(cfg.create_log_path(name).is_file(), "create log missing for {name}");
    }

    // create forced the trusted channel and overrode baked-in config
    let creates: Vec<String> = target
        .calls()
        .into_iter()
        .filter(|l| l.starts_with("env create"))
        .collect();
    assert_eq!(creates.len(), 2);
    for c in &creates {
        assert!(c.contains("-c conda-forge"), "{c}");
        assert!(c.contains("--override-channels"), "{c}");
    }

    // the declaration mentions aiohttp, so the sentinel probe ran
    assert!(
        target.calls().iter().any(|l| l.contains("import aiohttp")),
        "sentinel probe missing: {:?}",
        target.calls()
    );
}
