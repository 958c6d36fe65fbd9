#![cfg(unix)]
mod common;

use forgeshift::catalog::Selection;
use forgeshift::orchestrate::{Orchestrator, OutcomeStatus};

#[test]
fn explicit_selection_processes_known_names_and_warns_on_unknown() {
    let dir = tempfile::tempdir().expect("tempdir");
    let legacy = common::stub_legacy(dir.path(), &["alpha", "beta", "gamma"]);
    let target = common::stub_target(dir.path());
    let cfg = common::test_cfg(dir.path());

    let orch = Orchestrator::new(&cfg, &legacy.install, &target.install);
    let report = orch
        .run(&Selection::parse_named("beta, delta"))
        .expect("run");

    // beta migrated; delta reported as missing, not an error
    let beta = report.outcomes.iter().find(|o| o.name == "beta").unwrap();
    assert_eq!(beta.status, OutcomeStatus::Created);
    let delta = report.outcomes.iter().find(|o| o.name == "delta").unwrap();
    assert_eq!(delta.status, OutcomeStatus::MissingFromSource);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("delta")), "{:?}", report.warnings);
    assert!(report.success(), "missing-from-source is not a failure");

    // the target installation was never contacted about delta
    for line in target.calls() {
        assert!(!line.contains("delta"), "target contacted about delta: {line}");
    }
    // alpha and gamma were left alone entirely
    assert!(common::calls_for_env(&target, "alpha").is_empty());
    assert!(common::calls_for_env(&target, "gamma").is_empty());
}

#[test]
fn explicitly_selecting_base_warns_and_skips() {
    let dir = tempfile::tempdir().expect("tempdir");
    let legacy = common::stub_legacy(dir.path(), &["alpha"]);
    let target = common::stub_target(dir.path());
    let cfg = common::test_cfg(dir.path());

    let orch = Orchestrator::new(&cfg, &legacy.install, &target.install);
    let report = orch.run(&Selection::parse_named("base")).expect("run");

    assert!(report.outcomes.is_empty());
    assert!(report.warnings.iter().any(|w| w.contains("base")));
    assert!(!target.calls().iter().any(|l| l.contains("-n base")));
}
