#![cfg(unix)]
mod common;

use std::fs;

use forgeshift::{sanitize, MigrateError};

#[test]
fn risky_residue_outside_recognized_keys_fails_and_keeps_partial_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = common::test_cfg(dir.path());
    let file = dir.path().join("env.yml");
    // The mirror URL lives in an unrecognized key, so the line passes through
    // untouched and the post-rewrite scan must catch it.
    fs::write(
        &file,
        "name: ml\nchannels:\n  - defaults\nchannel_alias: https://repo.anaconda.com/pkgs/main\ndependencies:\n  - python\n",
    )
    .unwrap();

    let err = sanitize::sanitize_file(&file, &cfg).expect_err("residue must fail");
    match err {
        MigrateError::SanitizeFailed { tokens, .. } => {
            assert!(tokens.contains(&"repo.anaconda.com".to_string()), "{tokens:?}");
        }
        other => panic!("unexpected error: {other}"),
    }

    // partial rewrite left on disk for inspection: channels already canonical
    let text = fs::read_to_string(&file).unwrap();
    assert!(text.contains("channels:\n  - conda-forge\n"), "{text}");
    assert!(text.contains("repo.anaconda.com"), "{text}");
}

#[test]
fn sanitize_file_backs_up_once_then_rewrites() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = common::test_cfg(dir.path());
    let file = dir.path().join("env.yml");
    let original = "name: ml\nchannels:\n  - defaults\ndependencies:\n  - python\n";
    fs::write(&file, original).unwrap();

    sanitize::sanitize_file(&file, &cfg).expect("sanitize");

    let backup = sanitize::backup_path_for(&file, &cfg.backup_root);
    assert_eq!(fs::read_to_string(&backup).unwrap(), original);

    // second sanitize run: file already clean, backup untouched
    sanitize::sanitize_file(&file, &cfg).expect("sanitize again");
    assert_eq!(
        fs::read_to_string(&backup).unwrap(),
        original,
        "backup must be first-write-wins"
    );
}
