//! Declaration sanitizer.
//!
//! Rewrites an exported environment declaration so that exactly one trusted
//! channel remains and no stale `prefix` survives. The parser is deliberately
//! minimal: it recognizes only the four top-level keys (`name`, `channels`,
//! `dependencies`, `prefix`) and passes every other line through untouched,
//! so nested structures cannot be mis-matched.
//!
//! The rewrite is idempotent, and the original file is copied to the backup
//! root before the first overwrite (first-write-wins; later runs never clobber
//! the backup). After rewriting, a risky-token scan must come back clean or
//! the operation fails with `SanitizeFailed`; the partial file is kept on disk
//! for inspection.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::compliance;
use crate::config::RunConfig;
use crate::errors::MigrateError;

/// Split a top-level `key:` line into its value remainder, if the line
/// carries exactly that key. Indented lines are never top-level keys.
fn top_level_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    if line.starts_with(' ') || line.starts_with('\t') {
        return None;
    }
    let rest = line.strip_prefix(key)?;
    rest.strip_prefix(':')
}

/// Rewrite declaration text: drop every pre-existing `channels` section
/// (block list, inline bracket, or inline scalar) and every `prefix` line,
/// then insert a canonical single-entry channels block: after `name:` when
/// present, otherwise at the top.
pub fn sanitize_declaration(text: &str, trusted_channel: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut in_channels_block = false;

    for line in text.lines() {
        if in_channels_block {
            // Consume list items belonging to the channels key; the block
            // ends at the first line that is not a sequence entry.
            if line.trim_start().starts_with('-') {
                continue;
            }
            in_channels_block = false;
        }
        if let Some(value) = top_level_value(line, "channels") {
            // Inline forms (`channels: [a, b]`, `channels: defaults`) are the
            // whole section; an empty remainder opens a block list.
            if value.trim().is_empty() {
                in_channels_block = true;
            }
            continue;
        }
        if top_level_value(line, "prefix").is_some() {
            continue;
        }
        kept.push(line);
    }

    let canonical = [
        "channels:".to_string(),
        format!("  - {trusted_channel}"),
    ];

    let mut out: Vec<String> = Vec::new();
    let mut inserted = false;
    for line in &kept {
        out.push((*line).to_string());
        if !inserted && top_level_value(line, "name").is_some() {
            out.extend(canonical.iter().cloned());
            inserted = true;
        }
    }
    if !inserted {
        let mut fresh: Vec<String> = canonical.to_vec();
        fresh.extend(out);
        out = fresh;
    }

    let mut rewritten = out.join("\n");
    rewritten.push('\n');
    rewritten
}

/// Where the backup of `original` lives under the backup root: the original
/// path re-rooted with a `.bak` suffix.
pub fn backup_path_for(original: &Path, backup_root: &Path) -> PathBuf {
    let mut rel = PathBuf::new();
    for comp in original.components() {
        match comp {
            Component::Normal(c) => rel.push(c),
            _ => continue,
        }
    }
    let name = rel
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent = rel.parent().map(Path::to_path_buf).unwrap_or_default();
    backup_root.join(parent).join(format!("{name}.bak"))
}

/// Copy `original` into the backup root unless a backup already exists
/// (first-write-wins). Returns the backup path.
pub fn backup_once(original: &Path, backup_root: &Path) -> std::io::Result<PathBuf> {
    let dest = backup_path_for(original, backup_root);
    if dest.exists() {
        return Ok(dest);
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(original, &dest)?;
    Ok(dest)
}

/// Sanitize a declaration file in place: back up, rewrite, verify.
pub fn sanitize_file(path: &Path, cfg: &RunConfig) -> Result<(), MigrateError> {
    let text = fs::read_to_string(path)?;
    backup_once(path, &cfg.backup_root)?;
    let rewritten = sanitize_declaration(&text, &cfg.trusted_channel);
    fs::write(path, &rewritten)?;

    let tokens = compliance::find_risky_tokens(&rewritten);
    if !tokens.is_empty() {
        // Leave the partial rewrite on disk for inspection; not retried.
        return Err(MigrateError::SanitizeFailed {
            path: path.display().to_string(),
            tokens,
        });
    }
    Ok(())
}
