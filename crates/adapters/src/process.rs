use std::collections::VecDeque;
use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use opsdesk_core::execution::BackendError;
use opsdesk_core::local_shell::{ShellBackend, ShellKind};
use opsdesk_core::stream_runner::LineStream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::debug;

use crate::line_splitter::LineSplitter;

const READ_CHUNK: usize = 4096;

/// Runs commands through a local interpreter with piped output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioShellBackend;

#[async_trait]
impl ShellBackend for TokioShellBackend {
    type Stream = ProcessLineStream;

    async fn spawn(&self, shell: ShellKind, command: &str) -> Result<Self::Stream, BackendError> {
        let mut child = shell_command(shell, command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| {
                BackendError::new(format!("failed to start {}: {error}", shell.program()))
            })?;
        debug!(pid = child.id(), %shell, "spawned local process");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        Ok(ProcessLineStream {
            child,
            stdout,
            stderr,
            stdout_lines: LineSplitter::new(),
            stderr_lines: LineSplitter::new(),
            pending: VecDeque::new(),
            exit_code: None,
            finished: false,
        })
    }
}

fn shell_command(shell: ShellKind, command: &str) -> Command {
    let mut process = Command::new(shell.program());
    #[cfg(windows)]
    {
        // cmd.exe re-parses its own command line, so the command goes in unquoted.
        if shell == ShellKind::Cmd {
            process.arg("/C").raw_arg(command);
            return process;
        }
    }
    process.args(shell.args(command));
    process
}

enum PipeRead {
    Stdout(io::Result<usize>),
    Stderr(io::Result<usize>),
}

/// Output of a child process. Standard output and standard error are merged
/// line by line in the order they become readable.
#[derive(Debug)]
pub struct ProcessLineStream {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    stdout_lines: LineSplitter,
    stderr_lines: LineSplitter,
    pending: VecDeque<String>,
    exit_code: Option<i32>,
    finished: bool,
}

impl ProcessLineStream {
    async fn reap(&mut self) -> Result<(), BackendError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|error| BackendError::new(format!("failed to wait for process: {error}")))?;
        self.exit_code = status.code();
        self.finished = true;
        Ok(())
    }
}

#[async_trait]
impl LineStream for ProcessLineStream {
    async fn next_line(&mut self) -> Result<Option<String>, BackendError> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(Some(line));
            }
            if self.finished {
                return Ok(None);
            }
            if self.stdout.is_none() && self.stderr.is_none() {
                self.reap().await?;
                continue;
            }

            let mut stdout_buf = [0_u8; READ_CHUNK];
            let mut stderr_buf = [0_u8; READ_CHUNK];
            let read = tokio::select! {
                read = read_chunk(&mut self.stdout, &mut stdout_buf) => PipeRead::Stdout(read),
                read = read_chunk(&mut self.stderr, &mut stderr_buf) => PipeRead::Stderr(read),
            };

            match read {
                PipeRead::Stdout(Ok(0)) => {
                    self.stdout = None;
                    self.pending.extend(self.stdout_lines.finish());
                }
                PipeRead::Stdout(Ok(count)) => {
                    let lines = self.stdout_lines.push(&stdout_buf[..count]);
                    self.pending.extend(lines);
                }
                PipeRead::Stderr(Ok(0)) => {
                    self.stderr = None;
                    self.pending.extend(self.stderr_lines.finish());
                }
                PipeRead::Stderr(Ok(count)) => {
                    let lines = self.stderr_lines.push(&stderr_buf[..count]);
                    self.pending.extend(lines);
                }
                PipeRead::Stdout(Err(error)) | PipeRead::Stderr(Err(error)) => {
                    return Err(BackendError::new(format!(
                        "failed to read process output: {error}"
                    )));
                }
            }
        }
    }

    async fn cancel(&mut self) -> Result<(), BackendError> {
        if self.finished {
            return Ok(());
        }
        if let Err(error) = self.child.start_kill() {
            debug!(%error, "process already exited before kill");
        }
        self.stdout = None;
        self.stderr = None;
        self.pending.clear();
        self.reap().await
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}

async fn read_chunk<R>(reader: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}
