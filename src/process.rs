use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ExtractError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub(crate) struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

fn drain<R>(pipe: Option<R>, which: Pipe, sender: Sender<(Pipe, Vec<u8>)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        let _ = sender.send((which, buffer));
    });
}

/// Waits for both pipes to close, up to `deadline`. A descendant of the tool
/// can keep a pipe open after the tool itself exited; `None` means the
/// deadline passed first.
fn collect_until(
    receiver: &Receiver<(Pipe, Vec<u8>)>,
    deadline: Instant,
) -> Option<(String, String)> {
    let mut stdout = None;
    let mut stderr = None;
    while stdout.is_none() || stderr.is_none() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match receiver.recv_timeout(remaining) {
            Ok((Pipe::Stdout, bytes)) => stdout = Some(bytes),
            Ok((Pipe::Stderr, bytes)) => stderr = Some(bytes),
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let text = |bytes: Option<Vec<u8>>| {
        String::from_utf8_lossy(&bytes.unwrap_or_default()).into_owned()
    };
    Some((text(stdout), text(stderr)))
}

fn timed_out(tool: &str, timeout: Duration) -> ExtractError {
    tracing::warn!(tool, ?timeout, "external tool timed out");
    ExtractError::ToolTimeout {
        tool: tool.to_string(),
        timeout_secs: timeout.as_secs(),
    }
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Runs `command` to completion, killing it once `timeout` elapses. A
/// non-zero exit is reported as [`ExtractError::ToolFailed`].
pub(crate) fn run_with_timeout(
    mut command: Command,
    tool: &str,
    timeout: Duration,
) -> Result<ToolOutput, ExtractError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                ExtractError::BackendUnavailable(tool.to_string())
            } else {
                ExtractError::Io(error)
            }
        })?;

    let (sender, receiver) = mpsc::channel();
    drain(child.stdout.take(), Pipe::Stdout, sender.clone());
    drain(child.stderr.take(), Pipe::Stderr, sender);
    let deadline = Instant::now() + timeout;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                kill_and_reap(&mut child);
                return Err(timed_out(tool, timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(error) => {
                kill_and_reap(&mut child);
                return Err(ExtractError::Io(error));
            }
        }
    };

    let Some((stdout, stderr)) = collect_until(&receiver, deadline) else {
        return Err(timed_out(tool, timeout));
    };
    let output = ToolOutput {
        stdout,
        stderr,
        status,
    };

    if !output.status.success() {
        return Err(ExtractError::ToolFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(output)
}

#[cfg(all(test, unix))]
mod tests {
    use std::process::Command;
    use std::time::{Duration, Instant};

    use super::run_with_timeout;
    use crate::error::ExtractError;

    #[test]
    fn captures_stdout_of_successful_tools() {
        let mut command = Command::new("sh");
        command.args(["-c", "printf 'a,b\\n'"]);
        let output = run_with_timeout(command, "sh", Duration::from_secs(10))
            .expect("sh should run");
        assert_eq!(output.stdout, "a,b\n");
    }

    #[test]
    fn reports_non_zero_exit() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo broken >&2; exit 3"]);
        let error = run_with_timeout(command, "sh", Duration::from_secs(10))
            .expect_err("exit 3 should fail");
        match error {
            ExtractError::ToolFailed { stderr, .. } => assert_eq!(stderr, "broken"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn kills_tools_that_exceed_the_timeout() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let error = run_with_timeout(command, "sleep", Duration::from_millis(100))
            .expect_err("sleep should time out");
        assert!(matches!(error, ExtractError::ToolTimeout { .. }));
    }

    #[test]
    fn background_children_holding_the_pipe_do_not_outlive_the_timeout() {
        let mut command = Command::new("sh");
        command.args(["-c", "sleep 4 & echo a,b"]);
        let started = Instant::now();
        let error = run_with_timeout(command, "sh", Duration::from_millis(300))
            .expect_err("open pipe should time out");

        assert!(matches!(error, ExtractError::ToolTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn missing_programs_are_unavailable() {
        let command = Command::new("definitely-not-an-installed-table-tool");
        let error = run_with_timeout(command, "missing", Duration::from_secs(1))
            .expect_err("spawn should fail");
        assert!(error.is_unavailable());
    }
}
