//! Error mapping guide:
//! - Map io::ErrorKind::NotFound to exit code 127; all others to 1.
//! - Per-environment errors are recorded into outcomes, never raised to abort
//!   the run; only an unusable target installation is fatal.
use std::fmt;
use std::io;

/// Map an io::Error to a process exit code:
/// - 127 for NotFound (command not found)
/// - 1 for all other errors
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}

/// Per-step migration errors. Each variant is local to one environment except
/// `EnumerationUnavailable`, which blocks whatever needed the catalog.
#[derive(Debug)]
pub enum MigrateError {
    /// Catalog cannot be listed (installation present but not runnable, or absent).
    EnumerationUnavailable { installation: String, detail: String },
    /// `env export` returned nonzero for one environment.
    ExportFailed { name: String, exit: Option<i32>, detail: String },
    /// Rewritten declaration still contains risky tokens after sanitization.
    SanitizeFailed { path: String, tokens: Vec<String> },
    /// `env create` returned nonzero.
    CreateFailed { name: String, exit: Option<i32>, log: String },
    /// Runnability probe failed after creation (terminal, post-retry).
    VerifyFailed { name: String, detail: String },
    /// Interpreter reinstall into an existing environment did not restore runnability.
    RepairFailed { name: String, detail: String },
    Io(io::Error),
}

impl fmt::Display for MigrateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrateError::EnumerationUnavailable { installation, detail } => {
                write!(f, "cannot enumerate environments of {installation}: {detail}")
            }
            MigrateError::ExportFailed { name, exit, detail } => match exit {
                Some(code) => write!(f, "export of '{name}' failed (exit {code}): {detail}"),
                None => write!(f, "export of '{name}' failed (terminated by signal): {detail}"),
            },
            MigrateError::SanitizeFailed { path, tokens } => write!(
                f,
                "sanitized declaration {} still contains risky tokens: {}",
                path,
                tokens.join(", ")
            ),
            MigrateError::CreateFailed { name, exit, log } => match exit {
                Some(code) => write!(f, "create of '{name}' failed (exit {code}); see {log}"),
                None => write!(f, "create of '{name}' failed (terminated by signal); see {log}"),
            },
            MigrateError::VerifyFailed { name, detail } => {
                write!(f, "verification of '{name}' failed: {detail}")
            }
            MigrateError::RepairFailed { name, detail } => {
                write!(f, "interpreter repair of '{name}' failed: {detail}")
            }
            MigrateError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MigrateError {}

impl From<io::Error> for MigrateError {
    fn from(e: io::Error) -> Self {
        MigrateError::Io(e)
    }
}

/// Convert MigrateError to exit code (parity with io::Error mapping).
pub fn exit_code_for_migrate_error(e: &MigrateError) -> u8 {
    match e {
        MigrateError::Io(ioe) => exit_code_for_io_error(ioe),
        _ => 1,
    }
}
