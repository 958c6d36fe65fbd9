//! forgeshift: migrate a commercially-licensed conda installation to a
//! community-maintained one.
//!
//! The library surface mirrors the migration pipeline: discover installations
//! (`conda`), enumerate environments (`catalog`), export and sanitize
//! declarations (`sanitize`), recreate and verify under the target
//! (`orchestrate`, `probe`), and scan configuration for risky channel
//! references (`compliance`). `main.rs` is a thin clap front-end over this.

pub mod catalog;
pub mod color;
pub mod compliance;
pub mod conda;
pub mod config;
pub mod doctor;
pub mod errors;
pub mod exec;
pub mod lock;
pub mod orchestrate;
pub mod probe;
pub mod sanitize;
pub mod ui;

pub use color::{
    color_enabled_stderr, color_enabled_stdout, log_error_stderr, log_info_stderr,
    log_warn_stderr, paint, set_color_mode, ColorMode,
};
pub use conda::{discover_legacy, discover_target, CondaInstall, BASE_ENV};
pub use config::{DecisionPolicy, RunConfig, DEFAULT_TRUSTED_CHANNEL};
pub use errors::{exit_code_for_io_error, exit_code_for_migrate_error, MigrateError};
pub use exec::{ExecOutput, ExecRequest, ExecService};
pub use lock::{acquire_lock, acquire_lock_at, RunLock};
pub use orchestrate::{
    print_summary, EnvOutcome, GateReport, Orchestrator, OutcomeStatus, RunReport,
};
pub use ui::{confirm, warn_print};
