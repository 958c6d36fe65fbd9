//! Stderr warnings and the interactive confirmation used by Ask-mode policies.

use std::io::BufRead;
use std::io::Write;

/// Print a standardized warning line to stderr (color-aware).
pub fn warn_print(msg: &str) {
    let use_err = crate::color_enabled_stderr();
    eprintln!(
        "{}",
        crate::paint(use_err, "\x1b[33;1m", &format!("warning: {}", msg))
    );
}

/// Prompt for a yes/no decision on stderr, reading one line from stdin.
/// Non-interactive sessions (or FORGESHIFT_NO_PROMPT=1 / CI=1) answer `false`
/// so destructive actions never proceed silently without a terminal.
pub fn confirm(question: &str) -> bool {
    let interactive = atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stderr);
    let disabled = std::env::var("FORGESHIFT_NO_PROMPT").ok().as_deref() == Some("1")
        || std::env::var("CI").ok().as_deref() == Some("1");
    if !interactive || disabled {
        return false;
    }

    let use_err = crate::color_enabled_stderr();
    eprint!(
        "{}",
        crate::paint(use_err, "\x1b[90m", &format!("{} [y/N]: ", question))
    );
    let _ = std::io::stderr().flush();

    let mut line = String::new();
    let stdin = std::io::stdin();
    if stdin.lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim(), "y" | "Y" | "yes" | "YES")
}
