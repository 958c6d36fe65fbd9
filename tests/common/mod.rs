#![allow(dead_code)]
//! Shared harness: generated stub conda binaries so orchestrator paths run
//! without a real package manager. Each stub logs every invocation to a calls
//! file and reacts to control flags dropped into its ctrl directory.

use std::fs;
use std::path::{Path, PathBuf};

use forgeshift::{CondaInstall, RunConfig};

pub struct Stub {
    pub install: CondaInstall,
    pub calls: PathBuf,
    pub state: PathBuf,
    pub ctrl: PathBuf,
}

impl Stub {
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.calls)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn clear_calls(&self) {
        let _ = fs::write(&self.calls, "");
    }

    /// Drop a control flag the stub script reacts to.
    pub fn set_flag(&self, flag: &str) {
        fs::write(self.ctrl.join(flag), "").expect("write ctrl flag");
    }

    pub fn clear_flag(&self, flag: &str) {
        let _ = fs::remove_file(self.ctrl.join(flag));
    }

    /// Pre-seed the stub's environment state (as if the env already existed).
    pub fn seed_env(&self, name: &str) {
        let mut cur = fs::read_to_string(&self.state).unwrap_or_default();
        cur.push_str(&format!("{name}  /stub/envs/{name}\n"));
        fs::write(&self.state, cur).expect("seed state");
    }

    pub fn has_env(&self, name: &str) -> bool {
        fs::read_to_string(&self.state)
            .unwrap_or_default()
            .lines()
            .any(|l| l.split_whitespace().next() == Some(name))
    }
}

#[cfg(unix)]
fn write_script(path: &Path, content: &str) {
    use std::os::unix::fs::PermissionsExt;
    fs::write(path, content).expect("write stub script");
    let mut perms = fs::metadata(path).expect("stat stub").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).expect("chmod stub");
}

fn stub_paths(dir: &Path, side: &str) -> (PathBuf, PathBuf, PathBuf, PathBuf) {
    let root = dir.join(side);
    let bin_dir = root.join("bin");
    fs::create_dir_all(&bin_dir).expect("mkdir stub bin");
    let ctrl = root.join("ctrl");
    fs::create_dir_all(&ctrl).expect("mkdir ctrl");
    let calls = root.join("calls.log");
    let state = root.join("state.txt");
    (root, bin_dir.join("conda"), calls, state)
}

/// A well-behaved target installation. Control flags:
/// - fail_create / fail_create_once: `env create` exits 1
/// - fail_probe / fail_probe_once: `run` exits 1 with an ImportError
/// - probe_missing_python: `run` exits 127 ("command not found");
///   a successful `install` clears this flag (repair succeeds)
/// - fail_install: `install` exits 1 (repair fails)
pub fn stub_target(dir: &Path) -> Stub {
    let (root, binary, calls, state) = stub_paths(dir, "target");
    let ctrl = root.join("ctrl");
    let script = format!(
        r##"#!/bin/sh
CALLS="{calls}"
STATE="{state}"
CTRL="{ctrl}"
echo "$@" >> "$CALLS"
get_name() {{
  prev=""
  for a in "$@"; do
    if [ "$prev" = "-n" ]; then echo "$a"; return; fi
    prev="$a"
  done
}}
case "$1" in
  --version) echo "conda 24.7.1"; exit 0 ;;
  env)
    name=$(get_name "$@")
    case "$2" in
      list)
        echo "# conda environments:"
        echo "#"
        echo "base  /stub/target"
        [ -f "$STATE" ] && cat "$STATE"
        exit 0 ;;
      create)
        if [ -f "$CTRL/fail_create" ]; then echo "create boom" 1>&2; exit 1; fi
        if [ -f "$CTRL/fail_create_once" ]; then rm -f "$CTRL/fail_create_once"; echo "create boom" 1>&2; exit 1; fi
        echo "$name  /stub/envs/$name" >> "$STATE"
        exit 0 ;;
      remove)
        if [ -f "$STATE" ]; then grep -v "^$name " "$STATE" > "$STATE.tmp" || true; mv "$STATE.tmp" "$STATE"; fi
        exit 0 ;;
    esac
    exit 1 ;;
  run)
    if [ -f "$CTRL/probe_missing_python" ]; then echo "python: command not found" 1>&2; exit 127; fi
    if [ -f "$CTRL/fail_probe" ]; then echo "ImportError: boom" 1>&2; exit 1; fi
    if [ -f "$CTRL/fail_probe_once" ]; then rm -f "$CTRL/fail_probe_once"; echo "ImportError: boom" 1>&2; exit 1; fi
    echo "Python 3.11.0"
    exit 0 ;;
  install)
    if [ -f "$CTRL/fail_install" ]; then echo "install boom" 1>&2; exit 1; fi
    rm -f "$CTRL/probe_missing_python"
    exit 0 ;;
esac
exit 0
"##,
        calls = calls.display(),
        state = state.display(),
        ctrl = ctrl.display(),
    );
    write_script(&binary, &script);
    Stub {
        install: CondaInstall::new("target", root, binary),
        calls,
        state,
        ctrl,
    }
}

/// A legacy installation reporting the given environments. Exports a
/// declaration carrying the risky channel, a prefix line, and an aiohttp
/// dependency. Control flag: fail_export (`env export` exits 1).
pub fn stub_legacy(dir: &Path, envs: &[&str]) -> Stub {
    let (root, binary, calls, state) = stub_paths(dir, "legacy");
    let ctrl = root.join("ctrl");
    let mut list_lines = String::from(
        "        echo \"# conda environments:\"\n        echo \"#\"\n        echo \"base  *  /stub/legacy\"\n",
    );
    for e in envs {
        list_lines.push_str(&format!("        echo \"{e}  /stub/legacy/envs/{e}\"\n"));
    }
    let script = format!(
        r##"#!/bin/sh
CALLS="{calls}"
CTRL="{ctrl}"
echo "$@" >> "$CALLS"
get_name() {{
  prev=""
  for a in "$@"; do
    if [ "$prev" = "-n" ]; then echo "$a"; return; fi
    prev="$a"
  done
}}
case "$1" in
  --version) echo "conda 23.1.0"; exit 0 ;;
  env)
    name=$(get_name "$@")
    case "$2" in
      list)
{list_lines}        exit 0 ;;
      export)
        if [ -f "$CTRL/fail_export" ]; then echo "export boom" 1>&2; exit 1; fi
        echo "name: $name"
        echo "channels:"
        echo "  - defaults"
        echo "dependencies:"
        echo "  - python=3.11"
        echo "  - aiohttp=3.8"
        echo "prefix: /stub/legacy/envs/$name"
        exit 0 ;;
    esac
    exit 1 ;;
esac
exit 0
"##,
        calls = calls.display(),
        ctrl = ctrl.display(),
        list_lines = list_lines,
    );
    write_script(&binary, &script);
    Stub {
        install: CondaInstall::new("legacy", root, binary),
        calls,
        state,
        ctrl,
    }
}

/// A legacy installation whose binary cannot enumerate anything
/// (broken-prefix case).
pub fn broken_legacy(dir: &Path) -> Stub {
    let (root, binary, calls, state) = stub_paths(dir, "legacy");
    let ctrl = root.join("ctrl");
    let script = format!(
        "#!/bin/sh\necho \"$@\" >> \"{}\"\necho \"CondaError: prefix is broken\" 1>&2\nexit 1\n",
        calls.display()
    );
    write_script(&binary, &script);
    Stub {
        install: CondaInstall::new("legacy", root, binary),
        calls,
        state,
        ctrl,
    }
}

/// RunConfig rooted under the test directory; no env-var coupling.
pub fn test_cfg(dir: &Path) -> RunConfig {
    let mut cfg = RunConfig::from_env();
    cfg.export_root = dir.join("exports");
    cfg.backup_root = dir.join("backups");
    cfg.trusted_channel = "conda-forge".to_string();
    cfg.sentinels = vec!["aiohttp".to_string()];
    cfg.timeout = None;
    cfg
}

/// Lines in the calls log mentioning an environment name after `-n`.
pub fn calls_for_env(stub: &Stub, name: &str) -> Vec<String> {
    stub.calls()
        .into_iter()
        .filter(|l| l.contains(&format!("-n {name}")))
        .collect()
}
