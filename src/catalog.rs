//! Environment catalogs and the selection policy.
//!
//! `env list` output is line-oriented: comment lines start with `#`, an
//! asterisk marks the active environment, and the first whitespace-separated
//! field is the name. Prefix-only environments (first field an absolute path)
//! carry no name to migrate by and are skipped.

use crate::conda::CondaInstall;
use crate::errors::MigrateError;
use crate::exec::ExecService;

/// Parse raw `env list` output into environment names, in reported order.
pub fn parse_env_list(raw: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let first = match trimmed.split_whitespace().next() {
            Some(f) => f,
            None => continue,
        };
        if first == "*" || first.starts_with('/') {
            continue;
        }
        names.push(first.to_string());
    }
    names
}

/// List the named environments of one installation.
///
/// A present-but-unrunnable installation yields `EnumerationUnavailable`, not
/// an empty set; callers must be able to tell "no environments" from "cannot
/// enumerate" (broken prefix).
pub fn list_environments(
    install: &CondaInstall,
    svc: &ExecService,
) -> Result<Vec<String>, MigrateError> {
    let out = install
        .env_list(svc)
        .map_err(|e| MigrateError::EnumerationUnavailable {
            installation: install.label.clone(),
            detail: e.to_string(),
        })?;
    if !out.success() {
        return Err(MigrateError::EnumerationUnavailable {
            installation: install.label.clone(),
            detail: out.first_diagnostic_line(),
        });
    }
    Ok(parse_env_list(&out.stdout))
}

/// Which environments a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Named(Vec<String>),
}

/// Selection resolved against the source catalog: names to process in order,
/// and selected names absent from the source (skip-with-warning, never an error).
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub selected: Vec<String>,
    pub missing: Vec<String>,
}

impl Selection {
    /// Parse an explicit comma/space-separated list, normalized and
    /// de-duplicated with first-occurrence order preserved.
    pub fn parse_named(raw: &str) -> Selection {
        let mut names: Vec<String> = Vec::new();
        for tok in raw.split(|c: char| c == ',' || c.is_whitespace()) {
            let t = tok.trim();
            if t.is_empty() {
                continue;
            }
            if !names.iter().any(|n| n == t) {
                names.push(t.to_string());
            }
        }
        Selection::Named(names)
    }

    /// Resolve against the source catalog. `All` takes the catalog order;
    /// `Named` keeps the user-supplied order.
    pub fn resolve(&self, source: &[String]) -> ResolvedSelection {
        match self {
            Selection::All => ResolvedSelection {
                selected: source.to_vec(),
                missing: Vec::new(),
            },
            Selection::Named(names) => {
                let mut out = ResolvedSelection::default();
                for n in names {
                    if source.iter().any(|s| s == n) {
                        out.selected.push(n.clone());
                    } else {
                        out.missing.push(n.clone());
                    }
                }
                out
            }
        }
    }
}
