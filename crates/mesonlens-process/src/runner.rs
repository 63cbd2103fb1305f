//! Async execution of one external tool command
//!
//! The runner spawns the process, forwards its output through an event
//! channel and watches a shared cancellation flag on a fixed 500 ms
//! interval. The caller is never blocked; everything after the spawn
//! happens on background tasks.

use mesonlens_core::{Command, Error, Result};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// How often the watchdog polls the cancellation flag.
const WATCHDOG_INTERVAL: Duration = Duration::from_millis(500);

/// Whether stdout is streamed as line events or buffered for later
/// parsing. Introspection runs buffer; configure runs stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Stream,
    CaptureStdout,
}

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Normal exit, code available.
    Exited,
    /// Killed, crashed, or failed mid-flight (includes cancellation).
    Crashed,
}

/// Events emitted while a command runs.
#[derive(Debug)]
pub enum ProcessEvent {
    Started,
    /// One stdout line; suppressed in [`CaptureMode::CaptureStdout`].
    StdoutLine(String),
    StderrLine(String),
    /// Always the final event. `stdout` carries the verbatim captured
    /// bytes in capture mode, `stderr` is retained in both modes.
    Finished {
        code: i32,
        reason: ExitReason,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
}

/// Shared cancellation flag polled by the watchdog.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle on a running command: its event stream and cancellation flag.
#[derive(Debug)]
pub struct ProcessHandle {
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
    pub cancel: CancelHandle,
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}

async fn read_lines<R>(
    stream: R,
    events: mpsc::UnboundedSender<ProcessEvent>,
    make_event: fn(String) -> ProcessEvent,
) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        captured.extend_from_slice(line.as_bytes());
        captured.push(b'\n');
        let _ = events.send(make_event(line));
    }
    captured
}

async fn read_all<R>(stream: R) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Vec::new();
    let mut reader = BufReader::new(stream);
    let _ = reader.read_to_end(&mut captured).await;
    captured
}

/// Start `command` asynchronously.
///
/// Fails fast when the executable is missing or not executable; this is a
/// precondition check, not a race-free guarantee. On success the returned
/// handle's channel yields `Started`, output events per `mode`, and a
/// final `Finished`.
pub fn run(
    command: &Command,
    extra_env: &[(String, String)],
    mode: CaptureMode,
) -> Result<ProcessHandle> {
    if !command.exe.exists() {
        return Err(Error::ToolMissing(command.exe.clone()));
    }
    if !is_executable(&command.exe) {
        return Err(Error::ToolNotExecutable(command.exe.clone()));
    }

    let mut process = TokioCommand::new(&command.exe);
    process
        .args(&command.args)
        .current_dir(&command.work_dir)
        .envs(extra_env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("starting: {command}");
    let mut child = process
        .spawn()
        .map_err(|err| Error::Process(format!("failed to start {}: {err}", command.exe.display())))?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let cancel = CancelHandle::new();
    let watchdog_cancel = cancel.clone();

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    tokio::spawn(async move {
        let _ = events_tx.send(ProcessEvent::Started);

        let stdout_task = tokio::spawn({
            let events = events_tx.clone();
            async move {
                match (mode, stdout) {
                    (CaptureMode::Stream, Some(stream)) => {
                        read_lines(stream, events, ProcessEvent::StdoutLine).await
                    }
                    (CaptureMode::CaptureStdout, Some(stream)) => read_all(stream).await,
                    (_, None) => Vec::new(),
                }
            }
        });
        let stderr_task = tokio::spawn({
            let events = events_tx.clone();
            async move {
                match (mode, stderr) {
                    (CaptureMode::Stream, Some(stream)) => {
                        read_lines(stream, events, ProcessEvent::StderrLine).await
                    }
                    (CaptureMode::CaptureStdout, Some(stream)) => read_all(stream).await,
                    (_, None) => Vec::new(),
                }
            }
        });

        let mut cancelled = false;
        let mut interval = tokio::time::interval(WATCHDOG_INTERVAL);
        let status = loop {
            tokio::select! {
                status = child.wait() => break status,
                _ = interval.tick() => {
                    if watchdog_cancel.is_cancelled() && !cancelled {
                        cancelled = true;
                        debug!("cancellation requested, killing child");
                        if let Err(err) = child.start_kill() {
                            warn!("failed to kill child process: {err}");
                        }
                    }
                }
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        let (code, reason) = match status {
            Ok(status) if cancelled => (status.code().unwrap_or(-1), ExitReason::Crashed),
            Ok(status) => match status.code() {
                Some(code) => (code, ExitReason::Exited),
                // terminated by signal
                None => (-1, ExitReason::Crashed),
            },
            Err(err) => {
                warn!("failed waiting for child: {err}");
                (-1, ExitReason::Crashed)
            }
        };
        let _ = events_tx.send(ProcessEvent::Finished {
            code,
            reason,
            stdout,
            stderr,
        });
    });

    Ok(ProcessHandle {
        events: events_rx,
        cancel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh_command(dir: &std::path::Path, script: &str) -> Command {
        Command::new(
            "/bin/sh",
            dir,
            vec!["-c".to_owned(), script.to_owned()],
        )
    }

    async fn drain(mut handle: ProcessHandle) -> Vec<ProcessEvent> {
        let mut events = Vec::new();
        while let Some(event) = handle.events.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_missing_executable_fails_fast() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let _guard = runtime.enter();
        let command = Command::new("/no/such/tool", "/tmp", vec![]);
        let err = run(&command, &[], CaptureMode::Stream).unwrap_err();
        assert!(matches!(err, Error::ToolMissing(path) if path == PathBuf::from("/no/such/tool")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_streaming_run_emits_lines_and_exit() {
        let dir = tempfile::TempDir::new().unwrap();
        let command = sh_command(dir.path(), "echo one; echo two >&2; exit 3");
        let handle = run(&command, &[], CaptureMode::Stream).unwrap();
        let events = drain(handle).await;

        assert!(matches!(events.first(), Some(ProcessEvent::Started)));
        assert!(events
            .iter()
            .any(|e| matches!(e, ProcessEvent::StdoutLine(line) if line == "one")));
        assert!(events
            .iter()
            .any(|e| matches!(e, ProcessEvent::StderrLine(line) if line == "two")));
        assert!(matches!(
            events.last(),
            Some(ProcessEvent::Finished { code: 3, reason: ExitReason::Exited, .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_capture_mode_buffers_stdout_verbatim() {
        let dir = tempfile::TempDir::new().unwrap();
        let command = sh_command(dir.path(), "printf '{\"targets\": []}'");
        let handle = run(&command, &[], CaptureMode::CaptureStdout).unwrap();
        let events = drain(handle).await;

        assert!(!events
            .iter()
            .any(|e| matches!(e, ProcessEvent::StdoutLine(_))));
        match events.last() {
            Some(ProcessEvent::Finished { code: 0, stdout, .. }) => {
                assert_eq!(stdout, b"{\"targets\": []}");
            }
            other => panic!("unexpected final event: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_environment_is_passed_through() {
        let dir = tempfile::TempDir::new().unwrap();
        let command = sh_command(dir.path(), "printf '%s' \"$MESONLENS_TEST\"");
        let env = vec![("MESONLENS_TEST".to_owned(), "marker".to_owned())];
        let handle = run(&command, &env, CaptureMode::CaptureStdout).unwrap();
        let events = drain(handle).await;
        match events.last() {
            Some(ProcessEvent::Finished { stdout, .. }) => assert_eq!(stdout, b"marker"),
            other => panic!("unexpected final event: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_the_child() {
        let dir = tempfile::TempDir::new().unwrap();
        let command = sh_command(dir.path(), "sleep 30");
        let handle = run(&command, &[], CaptureMode::Stream).unwrap();
        handle.cancel.cancel();

        let events = tokio::time::timeout(Duration::from_secs(5), drain(handle))
            .await
            .expect("cancelled process must finish quickly");
        assert!(matches!(
            events.last(),
            Some(ProcessEvent::Finished { reason: ExitReason::Crashed, .. })
        ));
    }
}
