use std::io;
use std::time::Duration;
use thiserror::Error;

/// Error type for the gpumon telemetry engine
#[derive(Error, Debug)]
pub enum GpumonError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The external program could not be started at all.
    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The external program ran but exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    ProcessExit {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("`{command}` has no captured {stream}")]
    StreamUnavailable {
        command: String,
        stream: &'static str,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("`{command}` did not finish within {timeout:?}")]
    ProbeTimeout { command: String, timeout: Duration },

    /// Shutdown was requested while the command was still running.
    #[error("`{command}` was cancelled")]
    Cancelled { command: String },

    /// Terminal error for a polling worker.
    #[error("{worker} failed {attempts} times in a row, giving up: {last_error}")]
    RetryExhausted {
        worker: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Sampling failed: {0}")]
    Sampling(String),
}

/// Result type alias for gpumon
pub type Result<T> = std::result::Result<T, GpumonError>;

impl GpumonError {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        GpumonError::Config(msg.into())
    }

    /// Create a parse error
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        GpumonError::Parse(msg.into())
    }

    pub fn sampling<S: Into<String>>(msg: S) -> Self {
        GpumonError::Sampling(msg.into())
    }

    pub fn spawn<S: Into<String>>(command: S, source: io::Error) -> Self {
        GpumonError::Spawn {
            command: command.into(),
            source,
        }
    }

    pub fn stream_unavailable<S: Into<String>>(command: S, stream: &'static str) -> Self {
        GpumonError::StreamUnavailable {
            command: command.into(),
            stream,
        }
    }
}
