use crate::config::{Environment, Settings};
use crate::tool::{CallOutcome, EnvTool};
use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Drives the Vercel CLI (`vercel env add`).
///
/// Each call spawns `<program> [prefix...] env add <NAME> <ENV> --sensitive`,
/// writes the value to its stdin and closes it, then waits for the exit
/// status for at most `timeout`. A child still running at the deadline is
/// killed and reaped before the call returns.
///
/// # Examples
///
/// ```no_run
/// use envprovision::{Environment, EnvTool, VercelCli};
/// use std::time::Duration;
///
/// let cli = VercelCli::new("vercel", Duration::from_secs(10));
/// let outcome = cli.add("JWT_SECRET", "s3cr3t", Environment::Preview);
/// println!("{outcome}");
/// ```
#[derive(Debug, Clone)]
pub struct VercelCli {
    program: String,
    prefix: Vec<String>,
    timeout: Duration,
}

impl VercelCli {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            prefix: Vec::new(),
            timeout,
        }
    }

    /// Arguments placed between the program and `env add`, e.g. `vercel`
    /// when the program is `npx`.
    pub fn with_prefix<I, S>(mut self, prefix: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix = prefix.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the tool from resolved settings. The `tool` setting is split on
    /// whitespace, so `npx vercel` runs `npx` with a `vercel` prefix.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut words = settings.tool.split_whitespace();
        let program = words.next().unwrap_or(crate::config::DEFAULT_TOOL);
        Self::new(program, settings.timeout).with_prefix(words)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The arguments after the prefix for one `env add` call.
    pub fn env_add_args<'a>(name: &'a str, environment: Environment) -> [&'a str; 5] {
        ["env", "add", name, environment.as_str(), "--sensitive"]
    }

    fn not_installed_message(&self) -> String {
        format!(
            "{} not found on PATH (install it with 'npm i -g vercel', then run 'vercel login' and 'vercel link')",
            self.program
        )
    }

    fn execute(&self, name: &str, value: &str, environment: Environment) -> io::Result<CallOutcome> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix)
            .args(Self::env_add_args(name, environment))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(CallOutcome::LaunchError(self.not_installed_message()));
            }
            Err(e) => return Err(e),
        };
        let mut guard = ChildGuard::new(child);
        tracing::debug!(
            program = %self.program,
            variable = name,
            environment = %environment,
            pid = guard.child.id(),
            "spawned"
        );

        let deadline = Deadline::after(self.timeout);
        let writer = feed_stdin(guard.child.stdin.take(), value);
        let stdout = drain(guard.child.stdout.take());
        let stderr = drain(guard.child.stderr.take());

        let status = match guard.wait_until(deadline)? {
            Some(status) => status,
            None => {
                tracing::warn!(
                    variable = name,
                    environment = %environment,
                    timeout_ms = millis(self.timeout),
                    "no exit before deadline, killing"
                );
                guard.kill()?;
                return Ok(CallOutcome::Timeout);
            }
        };
        tracing::debug!(
            variable = name,
            environment = %environment,
            %status,
            elapsed_ms = millis(deadline.elapsed()),
            "exited"
        );

        // The child has exited, but anything it left running in the
        // background may still hold the pipes. The same deadline applies.
        let collected = collect(&writer, deadline).and_then(|written| {
            // stdout is read only so the child never blocks on a full pipe
            collect(&stdout, deadline)?;
            Ok((written, collect(&stderr, deadline)?))
        });
        let stderr = match collected {
            Ok((written, stderr)) => {
                written?;
                stderr
            }
            Err(RecvTimeoutError::Timeout) => return Ok(self.pipes_held_open(name, environment)),
            Err(RecvTimeoutError::Disconnected) => {
                return Ok(CallOutcome::LaunchError("pipe thread panicked".to_string()));
            }
        };

        if status.success() {
            return Ok(CallOutcome::Success);
        }
        let message = String::from_utf8_lossy(&stderr).trim().to_string();
        if message.is_empty() {
            Ok(CallOutcome::ToolError(status.to_string()))
        } else {
            Ok(CallOutcome::ToolError(message))
        }
    }

    fn pipes_held_open(&self, name: &str, environment: Environment) -> CallOutcome {
        tracing::warn!(
            variable = name,
            environment = %environment,
            timeout_ms = millis(self.timeout),
            "exited, but its output stayed open past the deadline"
        );
        CallOutcome::Timeout
    }
}

impl Default for VercelCli {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TOOL, crate::config::DEFAULT_TIMEOUT)
    }
}

impl EnvTool for VercelCli {
    fn add(&self, name: &str, value: &str, environment: Environment) -> CallOutcome {
        self.execute(name, value, environment)
            .unwrap_or_else(|e| CallOutcome::LaunchError(e.to_string()))
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Owns a spawned child for the duration of one call.
///
/// Dropping the guard kills and reaps a child that is still running, so no
/// process outlives the call whichever way it returns.
struct ChildGuard {
    child: Child,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child }
    }

    /// Polls for exit until `deadline`. `None` means still running.
    fn wait_until(&mut self, deadline: Deadline) -> io::Result<Option<ExitStatus>> {
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(Some(status));
            }
            match deadline.remaining() {
                Some(remaining) if remaining.is_zero() => return Ok(None),
                Some(remaining) => thread::sleep(POLL_INTERVAL.min(remaining)),
                None => thread::sleep(POLL_INTERVAL),
            }
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        // the child may exit between the last poll and here
        if self.child.try_wait()?.is_none() {
            self.child.kill()?;
        }
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// The instant one call gives up at.
///
/// A timeout too large to add to the current instant means no limit.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    started: Instant,
    at: Option<Instant>,
}

impl Deadline {
    fn after(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            at: started.checked_add(timeout),
        }
    }

    /// Time left, or `None` when unbounded.
    fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Waits for a helper thread's result, but no later than `deadline`.
fn collect<T>(rx: &Receiver<T>, deadline: Deadline) -> Result<T, RecvTimeoutError> {
    match deadline.remaining() {
        Some(remaining) => rx.recv_timeout(remaining),
        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
    }
}

/// Writes `value` to the child's stdin on its own thread and closes it.
///
/// A tool that exits without reading raises `BrokenPipe`, which is ignored:
/// the exit status decides the outcome.
fn feed_stdin(stdin: Option<ChildStdin>, value: &str) -> Receiver<io::Result<()>> {
    let (tx, rx) = mpsc::channel();
    let value = value.to_owned();
    thread::spawn(move || {
        let result = match stdin {
            Some(mut stdin) => match stdin.write_all(value.as_bytes()) {
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            },
            None => Ok(()),
        };
        let _ = tx.send(result);
    });
    rx
}

/// Reads a pipe to EOF on its own thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(buf);
    });
    rx
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
