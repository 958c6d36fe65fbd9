//! Runnability probe for a target environment.
//!
//! Four steps, all through `conda run -n <name>`:
//! 1. the interpreter reports a version,
//! 2. the interpreter reports its own executable path,
//! 3. pip (the package-manager support library) reports a version,
//! 4. each sentinel dependency mentioned by the environment's declaration
//!    imports and reports a version.
//!
//! A missing interpreter is distinguished from every other failure because it
//! gates the one-shot repair path (reinstall python) instead of the full
//! remove-and-recreate path.

use serde::Deserialize;

use crate::conda::CondaInstall;
use crate::exec::ExecService;

#[derive(Debug)]
pub enum ProbeError {
    /// The interpreter binary itself is absent from the environment.
    MissingInterpreter(String),
    /// Any other probe-step failure.
    Failed(String),
}

impl ProbeError {
    pub fn detail(&self) -> &str {
        match self {
            ProbeError::MissingInterpreter(s) | ProbeError::Failed(s) => s,
        }
    }
}

fn looks_like_missing_interpreter(exit: Option<i32>, stderr: &str) -> bool {
    if exit == Some(127) {
        return true;
    }
    let s = stderr.to_ascii_lowercase();
    s.contains("command not found")
        || s.contains("no such file or directory")
        || s.contains("executable not found")
}

/// Run the full probe sequence. `declaration` is the environment's exported
/// declaration text when available; without it the sentinel step is skipped.
pub fn probe_environment(
    target: &CondaInstall,
    svc: &ExecService,
    name: &str,
    sentinels: &[String],
    declaration: Option<&str>,
) -> Result<(), ProbeError> {
    // 1. interpreter version
    let out = target
        .run_in(svc, name, &["python", "--version"])
        .map_err(|e| ProbeError::Failed(format!("python --version: {e}")))?;
    if !out.success() {
        let diag = out.first_diagnostic_line();
        if looks_like_missing_interpreter(out.exit_code(), &out.stderr) {
            return Err(ProbeError::MissingInterpreter(diag));
        }
        return Err(ProbeError::Failed(format!("python --version: {diag}")));
    }

    // 2. interpreter path
    let out = target
        .run_in(
            svc,
            name,
            &["python", "-c", "import sys; print(sys.executable)"],
        )
        .map_err(|e| ProbeError::Failed(format!("sys.executable: {e}")))?;
    if !out.success() || out.stdout.trim().is_empty() {
        return Err(ProbeError::Failed(format!(
            "sys.executable: {}",
            out.first_diagnostic_line()
        )));
    }

    // 3. support library
    let out = target
        .run_in(
            svc,
            name,
            &["python", "-c", "import pip; print(pip.__version__)"],
        )
        .map_err(|e| ProbeError::Failed(format!("pip: {e}")))?;
    if !out.success() {
        return Err(ProbeError::Failed(format!(
            "pip: {}",
            out.first_diagnostic_line()
        )));
    }

    // 4. sentinels mentioned by the declaration
    if let Some(decl) = declaration {
        for sentinel in sentinels {
            if !declaration_mentions(decl, sentinel) {
                continue;
            }
            let script = format!("import {sentinel}; print({sentinel}.__version__)");
            let out = target
                .run_in(svc, name, &["python", "-c", &script])
                .map_err(|e| ProbeError::Failed(format!("{sentinel}: {e}")))?;
            if !out.success() {
                return Err(ProbeError::Failed(format!(
                    "{sentinel}: {}",
                    out.first_diagnostic_line()
                )));
            }
        }
    }

    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct Declaration {
    #[allow(dead_code)]
    name: Option<String>,
    #[allow(dead_code)]
    channels: Option<Vec<String>>,
    dependencies: Option<Vec<serde_yaml::Value>>,
}

/// Package name of a conda/pip specifier: everything before the first
/// version-constraint character.
fn spec_name(spec: &str) -> &str {
    spec.split(|c: char| "=<>!~ ".contains(c))
        .next()
        .unwrap_or(spec)
}

/// True when the declaration's dependencies (including nested pip lists)
/// mention `package`. Falls back to a word scan when the document does not
/// parse as YAML.
pub fn declaration_mentions(text: &str, package: &str) -> bool {
    match serde_yaml::from_str::<Declaration>(text) {
        Ok(decl) => {
            let deps = match decl.dependencies {
                Some(d) => d,
                None => return false,
            };
            for dep in deps {
                match dep {
                    serde_yaml::Value::String(s) => {
                        if spec_name(s.trim()).eq_ignore_ascii_case(package) {
                            return true;
                        }
                    }
                    serde_yaml::Value::Mapping(m) => {
                        // pip-style sub-list: {pip: [specs...]}
                        for (_k, v) in m {
                            if let serde_yaml::Value::Sequence(seq) = v {
                                for item in seq {
                                    if let serde_yaml::Value::String(s) = item {
                                        if spec_name(s.trim()).eq_ignore_ascii_case(package) {
                                            return true;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            false
        }
        Err(_) => text
            .lines()
            .any(|l| spec_name(l.trim().trim_start_matches('-').trim()) == package),
    }
}
