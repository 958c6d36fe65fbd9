use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use wait_timeout::ChildExt;

/// Structured command execution with captured output and an optional deadline.
///
/// The default deadline is none: a hung external command hangs the step, which
/// matches the package manager's own behavior. `--timeout-secs` opts into a
/// per-step deadline; a timed-out step fails like any nonzero exit.
#[derive(Debug, Clone, Default)]
pub struct ExecService {
    default_timeout: Option<Duration>,
}

impl ExecService {
    pub fn new(default_timeout: Option<Duration>) -> Self {
        Self { default_timeout }
    }

    pub fn run(&self, request: ExecRequest) -> Result<ExecOutput> {
        let mut cmd = Command::new(&request.program);
        for arg in &request.args {
            cmd.arg(arg);
        }
        if let Some(ref cwd) = request.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &request.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd.spawn().with_context(|| {
            format!(
                "failed to spawn {:?} with args {:?}",
                request.program, request.args
            )
        })?;

        // Drain both pipes on background threads so a chatty child never
        // fills a pipe buffer and stalls against our wait().
        let stdout_reader = spawn_drain(child.stdout.take());
        let stderr_reader = spawn_drain(child.stderr.take());

        let timeout = request.timeout.or(self.default_timeout);
        let started = Instant::now();
        let status = match timeout {
            None => child.wait().context("failed to wait for process")?,
            Some(t) if t.is_zero() => child.wait().context("failed to wait for process")?,
            Some(t) => match child.wait_timeout(t).context("failed to wait with timeout")? {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = join_drain(stdout_reader);
                    let _ = join_drain(stderr_reader);
                    return Err(anyhow!(
                        "command {:?} timed out after {:?}",
                        request.program,
                        t
                    ));
                }
            },
        };

        let duration = started.elapsed();
        let stdout = join_drain(stdout_reader)?;
        let stderr = join_drain(stderr_reader)?;

        Ok(ExecOutput {
            status,
            duration,
            stdout,
            stderr,
        })
    }
}

fn spawn_drain<R>(stream: Option<R>) -> Option<thread::JoinHandle<io::Result<String>>>
where
    R: io::Read + Send + 'static,
{
    stream.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = String::new();
            reader.read_to_string(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_drain(handle: Option<thread::JoinHandle<io::Result<String>>>) -> Result<String> {
    match handle {
        None => Ok(String::new()),
        Some(h) => h
            .join()
            .map_err(|_| anyhow!("output reader thread panicked"))?
            .context("failed to read process output"),
    }
}

#[derive(Debug, Default)]
pub struct ExecRequest {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
    timeout: Option<Duration>,
}

impl ExecRequest {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug)]
pub struct ExecOutput {
    pub status: std::process::ExitStatus,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    /// First non-empty line of stderr, falling back to stdout, for one-line diagnostics.
    pub fn first_diagnostic_line(&self) -> String {
        self.stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_code() {
        let svc = ExecService::default();
        let out = svc
            .run(ExecRequest::new("sh").arg("-c").arg("echo hello; exit 3"))
            .expect("spawn sh");
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.exit_code(), Some(3));
        assert!(!out.success());
    }

    #[test]
    fn timeout_kills_hung_command() {
        let svc = ExecService::default();
        let err = svc
            .run(
                ExecRequest::new("sh")
                    .arg("-c")
                    .arg("sleep 10")
                    .timeout(Duration::from_millis(100)),
            )
            .expect_err("sleep should time out");
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[test]
    fn unbounded_wait_drains_large_output() {
        // 1 MiB on each pipe, well past the kernel pipe buffer, with no
        // deadline set: run() must still return with the full capture.
        let svc = ExecService::new(None);
        let out = svc
            .run(
                ExecRequest::new("sh")
                    .arg("-c")
                    .arg("yes x | head -c 1048576; yes e | head -c 1048576 1>&2"),
            )
            .expect("spawn sh");
        assert!(out.success());
        assert_eq!(out.stdout.len(), 1048576);
        assert_eq!(out.stderr.len(), 1048576);
    }

    #[test]
    fn first_diagnostic_prefers_stderr() {
        let svc = ExecService::default();
        let out = svc
            .run(
                ExecRequest::new("sh")
                    .arg("-c")
                    .arg("echo out; echo err 1>&2"),
            )
            .expect("spawn sh");
        assert_eq!(out.first_diagnostic_line(), "err");
    }
}
