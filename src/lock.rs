//! Advisory single-writer lock on the target installation.
//!
//! Package-manager operations on a shared installation root are unsafe to run
//! concurrently, so `migrate` takes an exclusive file lock before touching the
//! target. FORGESHIFT_SKIP_LOCK=1 bypasses it (nested or scripted runs).

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Lock guard that removes the lock file on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Best-effort unlock; ignore errors
        let _ = self.file.unlock();

        let path = self.path.clone();
        for _ in 0..10 {
            if !path.exists() {
                break;
            }
            if fs::remove_file(&path).is_ok() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(100));
        }
    }
}

fn candidate_lock_paths(target_root: &Path) -> Vec<PathBuf> {
    let mut paths = vec![target_root.join(".forgeshift.lock")];
    let mut tmp = std::env::temp_dir();
    let tag = target_root
        .display()
        .to_string()
        .replace(['/', '\\', ':'], "_");
    tmp.push(format!("forgeshift-{tag}.lock"));
    paths.push(tmp);
    paths
}

/// Acquire a non-blocking exclusive lock scoped to the target root.
/// Falls back to a tmp-dir lock when the root itself is not writable.
pub fn acquire_lock(target_root: &Path) -> io::Result<RunLock> {
    if std::env::var("FORGESHIFT_SKIP_LOCK").ok().as_deref() == Some("1") {
        // Bypass via an unlocked handle on a throwaway tmp file
        let p = std::env::temp_dir().join(format!("forgeshift-skiplock-{}", std::process::id()));
        let f = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&p)?;
        return Ok(RunLock { file: f, path: p });
    }

    let mut last_err: Option<io::Error> = None;
    for p in candidate_lock_paths(target_root) {
        if let Some(parent) = p.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&p)
        {
            Ok(f) => match f.try_lock_exclusive() {
                Ok(_) => return Ok(RunLock { file: f, path: p }),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Err(io::Error::other(
                        "another migration is already running against this installation (lock held); try again later",
                    ));
                }
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            },
            Err(e) => {
                last_err = Some(e);
                continue;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::other("could not create any lock file")))
}

/// Acquire a lock at an explicit path (used by tests).
pub fn acquire_lock_at(path: &Path) -> io::Result<RunLock> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let f = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    match f.try_lock_exclusive() {
        Ok(_) => Ok(RunLock {
            file: f,
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(io::Error::other(
            "another migration is already running against this installation (lock held); try again later",
        )),
        Err(e) => Err(e),
    }
}
