#![cfg(unix)]
mod common;

use forgeshift::catalog::Selection;
use forgeshift::orchestrate::Orchestrator;

#[test]
fn dry_run_only_lists_and_never_mutates() {
    let dir = tempfile::tempdir().expect("tempdir");
    let legacy = common::stub_legacy(dir.path(), &["ml", "web"]);
    let target = common::stub_target(dir.path());
    let mut cfg = common::test_cfg(dir.path());
    cfg.dry_run = true;

    let orch = Orchestrator::new(&cfg, &legacy.install, &target.install);
    let report = orch.run(&Selection::All).expect("dry run");
    assert!(report.success());

    for line in target.calls() {
        assert!(
            line.starts_with("env list"),
            "mutating/probing call during dry run: {line}"
        );
    }
    for line in legacy.calls() {
        assert!(
            line.starts_with("env list"),
            "legacy touched beyond listing during dry run: {line}"
        );
    }
    assert!(!cfg.declaration_path("ml").exists());
}
