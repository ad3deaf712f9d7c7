use crate::config::Config;
use crate::error::MonitorError;
use log::{debug, info};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

/// Predicate handed to `log stream`: capture session messages mentioning inputs.
pub const PREDICATE: &str =
    "subsystem == \"com.apple.cameracapture\" and eventMessage contains \"Input\"";

/// A line-oriented source the monitor can read from and shut down.
pub trait LogSource {
    /// Next line of output, or `None` once the source has closed.
    async fn next_line(&mut self) -> Result<Option<String>, MonitorError>;

    /// Ask the source to stop. Does not wait for it to exit.
    fn terminate(&mut self) -> Result<(), MonitorError>;
}

/// A running `log stream` child process with its stdout split into lines.
pub struct LogStream {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl LogStream {
    /// Launch `<log_command> stream --predicate <PREDICATE>`.
    pub fn start(config: &Config) -> Result<Self, MonitorError> {
        Self::spawn(&config.log_command, &["stream", "--predicate", PREDICATE])
    }

    pub fn spawn(program: &str, args: &[&str]) -> Result<Self, MonitorError> {
        debug!("Spawning {} {:?}", program, args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| MonitorError::SpawnError {
                command: program.to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or(MonitorError::NoStdout)?;
        info!("Log stream started (pid {:?})", child.id());

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
        })
    }
}

impl LogSource for LogStream {
    async fn next_line(&mut self) -> Result<Option<String>, MonitorError> {
        self.lines.next_line().await.map_err(MonitorError::ReadError)
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> Result<(), MonitorError> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.child.id() else {
            // Already reaped
            return Ok(());
        };

        let raw = i32::try_from(pid)
            .map_err(|_| MonitorError::TerminateError(format!("pid {} out of range", pid)))?;

        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(MonitorError::TerminateError(e.to_string())),
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> Result<(), MonitorError> {
        self.child
            .start_kill()
            .map_err(|e| MonitorError::TerminateError(e.to_string()))
    }
}
