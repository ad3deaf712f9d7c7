use thiserror::Error;

/// Any failure while streaming or processing log output.
///
/// The monitor treats every variant the same way: report once, then ask
/// the child process to terminate.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to start log stream '{command}': {source}")]
    SpawnError {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Log stream stdout not available")]
    NoStdout,

    #[error("Failed to read from log stream: {0}")]
    ReadError(#[source] std::io::Error),

    #[error("Failed to write status line: {0}")]
    WriteError(#[source] std::io::Error),

    #[error("Failed to terminate log stream: {0}")]
    TerminateError(String),
}
