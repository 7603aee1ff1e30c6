//! Ownership of one external process and its output pipes.
//!
//! A [`ProcessSession`] is opened, used, and then closed with
//! [`ProcessSession::close`], which kills and reaps the child if it is still
//! running. Dropping an unclosed session still sends the kill signal.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

use crate::error::{GpumonError, Result};

/// Program plus arguments, with a short name used in log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let program = program.into();
        Self {
            name: program.clone(),
            program,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Everything a finished process wrote.
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

pub struct ProcessSession {
    command: String,
    child: Child,
    closed: bool,
}

impl ProcessSession {
    /// Spawn `spec` with stdout and stderr piped. Does not wait for the child.
    pub fn open(spec: &CommandSpec) -> Result<Self> {
        let command = spec.to_string();

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GpumonError::spawn(command.clone(), e))?;

        log::debug!("Spawned `{}` (pid {:?})", command, child.id());

        Ok(Self {
            command,
            child,
            closed: false,
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// OS pid, `None` once the child has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Hand out both output pipes. Fails if either was already taken or never
    /// captured; the session must then be closed.
    pub fn take_streams(&mut self) -> Result<(ChildStdout, ChildStderr)> {
        let stdout = self.child.stdout.take();
        let stderr = self.child.stderr.take();

        match (stdout, stderr) {
            (Some(out), Some(err)) => Ok((out, err)),
            (None, _) => Err(GpumonError::stream_unavailable(self.command.clone(), "stdout")),
            (_, None) => Err(GpumonError::stream_unavailable(self.command.clone(), "stderr")),
        }
    }

    /// Wait for the child to exit on its own.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        Ok(self.child.wait().await?)
    }

    /// Read both pipes to the end and wait for exit, bounded by `timeout`.
    pub async fn wait_with_output(&mut self, timeout: Duration) -> Result<ProcessOutput> {
        let (mut stdout, mut stderr) = self.take_streams()?;
        let child = &mut self.child;

        let collect = async move {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (out_res, err_res) = tokio::join!(
                stdout.read_to_end(&mut out),
                stderr.read_to_end(&mut err)
            );
            out_res?;
            err_res?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>(ProcessOutput {
                status,
                stdout: out,
                stderr: err,
            })
        };

        match tokio::time::timeout(timeout, collect).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(GpumonError::ProbeTimeout {
                command: self.command.clone(),
                timeout,
            }),
        }
    }

    /// Kill the child if it is still running and wait for the OS to reap it.
    /// Safe to call more than once.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match self.child.try_wait() {
            Ok(Some(status)) => {
                log::trace!("`{}` already exited ({})", self.command, status);
                return;
            }
            Ok(None) => {}
            Err(e) => log::warn!("Could not poll `{}`: {}", self.command, e),
        }

        // start_kill fails if the child exited in the meantime; wait still reaps it
        if let Err(e) = self.child.start_kill() {
            log::trace!("Kill of `{}` skipped: {}", self.command, e);
        }
        match self.child.wait().await {
            Ok(status) => log::debug!("Terminated `{}` ({})", self.command, status),
            Err(e) => log::warn!("Failed to reap `{}`: {}", self.command, e),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if !self.closed {
            // Reaping is left to tokio's orphan queue here
            let _ = self.child.start_kill();
        }
    }
}

/// Body future run inside [`with_session`].
pub type SessionFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Open `spec`, run `body`, and close the session whatever the outcome.
///
/// Cancellation is raced against `body` here, inside the scope, so the child
/// is always killed and reaped before this returns
/// [`GpumonError::Cancelled`].
pub async fn with_session<T, F>(spec: &CommandSpec, cancel: &CancellationToken, body: F) -> Result<T>
where
    F: for<'a> FnOnce(&'a mut ProcessSession) -> SessionFuture<'a, T>,
{
    let mut session = ProcessSession::open(spec)?;
    let outcome = tokio::select! {
        _ = cancel.cancelled() => Err(GpumonError::Cancelled {
            command: spec.to_string(),
        }),
        outcome = body(&mut session) => outcome,
    };
    session.close().await;
    outcome
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", ["-c", script])
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let spec = CommandSpec::new("/definitely/not/a/real/tool", ["-q"]);
        let err = ProcessSession::open(&spec).err().unwrap();
        assert!(matches!(err, GpumonError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_wait_with_output() {
        let mut session = ProcessSession::open(&sh("echo out; echo err >&2")).unwrap();
        let output = session.wait_with_output(Duration::from_secs(5)).await.unwrap();
        session.close().await;

        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "err");
    }

    #[tokio::test]
    async fn test_timeout_then_close_reaps() {
        let mut session = ProcessSession::open(&sh("sleep 30")).unwrap();
        let err = session
            .wait_with_output(Duration::from_millis(100))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GpumonError::ProbeTimeout { .. }));

        session.close().await;
        session.close().await;
        assert!(session.is_closed());
        assert_eq!(session.id(), None);
    }

    #[tokio::test]
    async fn test_streams_taken_twice() {
        let mut session = ProcessSession::open(&sh("true")).unwrap();
        assert!(session.take_streams().is_ok());
        let err = session.take_streams().err().unwrap();
        assert!(matches!(err, GpumonError::StreamUnavailable { stream: "stdout", .. }));
        session.close().await;
    }

    #[tokio::test]
    async fn test_with_session_closes_on_error() {
        let cancel = CancellationToken::new();
        let result: Result<()> = with_session(&sh("sleep 30"), &cancel, |session| {
            Box::pin(async move {
                assert!(session.id().is_some());
                Err(GpumonError::parse("body failed"))
            })
        })
        .await;
        assert!(matches!(result, Err(GpumonError::Parse(_))));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_with_session_cancel_reaps_before_return() {
        let cancel = CancellationToken::new();
        let mut pid = None;
        let result: Result<()> = with_session(&sh("exec sleep 30"), &cancel, |session| {
            pid = session.id();
            cancel.cancel();
            Box::pin(std::future::pending::<Result<()>>())
        })
        .await;

        assert!(matches!(result, Err(GpumonError::Cancelled { .. })));
        let proc_entry = format!("/proc/{}", pid.unwrap());
        assert!(!std::path::Path::new(&proc_entry).exists());
    }

    #[test]
    fn test_command_display() {
        let spec = CommandSpec::new("nvidia-smi", ["dmon", "-i", "0"]).named("nvidia-dmon");
        assert_eq!(spec.to_string(), "nvidia-smi dmon -i 0");
        assert_eq!(spec.name, "nvidia-dmon");
    }
}
