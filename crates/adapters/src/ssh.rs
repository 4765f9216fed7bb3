use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opsdesk_core::execution::BackendError;
use opsdesk_core::params::ConnectionParams;
use opsdesk_core::remote_shell::{RemoteSession, RemoteShellBackend};
use opsdesk_core::stream_runner::LineStream;
use russh::client::{self, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::line_splitter::LineSplitter;

/// Prefix of the final line carrying the remote command's standard error.
pub const STDERR_LABEL: &str = "stderr: ";

/// Extended-data type code for standard error (RFC 4254 section 5.2).
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Host keys are not pinned; any key presented by the server is accepted.
        Ok(true)
    }
}

/// Password-authenticated SSH client.
#[derive(Debug, Clone, Copy, Default)]
pub struct RusshRemoteShellBackend;

#[async_trait]
impl RemoteShellBackend for RusshRemoteShellBackend {
    type Session = RusshSession;

    async fn connect(
        &self,
        params: &ConnectionParams,
        timeout: Duration,
    ) -> Result<Self::Session, BackendError> {
        let config = Arc::new(client::Config::default());
        let address = (params.host.clone(), params.port);

        // Handshake and authentication share one deadline.
        let establishing = async {
            let mut handle = client::connect(config, address, ClientHandler)
                .await
                .map_err(|error| {
                    BackendError::new(format!(
                        "failed to connect to {}: {error}",
                        params.target()
                    ))
                })?;
            let authenticated = handle
                .authenticate_password(params.username.as_str(), params.secret())
                .await
                .map_err(|error| BackendError::new(format!("ssh authentication failed: {error}")))?;
            if !authenticated {
                return Err(BackendError::new(format!(
                    "authentication rejected for {}",
                    params.target()
                )));
            }
            Ok::<_, BackendError>(handle)
        };
        let handle = tokio::time::timeout(timeout, establishing)
            .await
            .map_err(|_| {
                BackendError::new(format!(
                    "connection to {} timed out after {}s",
                    params.target(),
                    timeout.as_secs()
                ))
            })??;

        info!(endpoint = %params.target(), "ssh authentication succeeded");
        Ok(RusshSession {
            handle: Mutex::new(handle),
        })
    }
}

/// An authenticated connection; each command runs on its own channel.
pub struct RusshSession {
    handle: Mutex<client::Handle<ClientHandler>>,
}

#[async_trait]
impl RemoteSession for RusshSession {
    type Stream = RemoteCommandStream;

    async fn exec(&self, command: &str) -> Result<Self::Stream, BackendError> {
        let channel = self
            .handle
            .lock()
            .await
            .channel_open_session()
            .await
            .map_err(|error| BackendError::new(format!("failed to open ssh channel: {error}")))?;
        channel
            .exec(true, command)
            .await
            .map_err(|error| {
                BackendError::new(format!("failed to start remote command: {error}"))
            })?;
        debug!(command, "remote command started");
        Ok(RemoteCommandStream::new(channel))
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.handle
            .lock()
            .await
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
            .map_err(|error| BackendError::new(format!("ssh disconnect failed: {error}")))
    }
}

/// Output of one remote command. Standard output is streamed as it arrives;
/// standard error is collected and emitted after it as a single line prefixed
/// with [`STDERR_LABEL`].
pub struct RemoteCommandStream {
    channel: Channel<Msg>,
    stdout_lines: LineSplitter,
    stderr: Vec<u8>,
    pending: VecDeque<String>,
    exit_code: Option<i32>,
    finished: bool,
}

impl RemoteCommandStream {
    fn new(channel: Channel<Msg>) -> Self {
        Self {
            channel,
            stdout_lines: LineSplitter::new(),
            stderr: Vec::new(),
            pending: VecDeque::new(),
            exit_code: None,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.pending.extend(self.stdout_lines.finish());
        self.pending.extend(labelled_stderr(&self.stderr));
        self.finished = true;
    }
}

fn labelled_stderr(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(format!("{STDERR_LABEL}{text}"))
}

#[async_trait]
impl LineStream for RemoteCommandStream {
    async fn next_line(&mut self) -> Result<Option<String>, BackendError> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(Some(line));
            }
            if self.finished {
                return Ok(None);
            }

            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    let lines = self.stdout_lines.push(&data);
                    self.pending.extend(lines);
                }
                Some(ChannelMsg::ExtendedData { data, ext })
                    if ext == SSH_EXTENDED_DATA_STDERR =>
                {
                    self.stderr.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    self.exit_code = Some(i32::try_from(exit_status).unwrap_or(i32::MAX));
                }
                Some(ChannelMsg::Close) | None => self.finish(),
                Some(_) => {}
            }
        }
    }

    async fn cancel(&mut self) -> Result<(), BackendError> {
        self.finished = true;
        self.pending.clear();
        self.channel
            .close()
            .await
            .map_err(|error| BackendError::new(format!("failed to close ssh channel: {error}")))
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}

#[cfg(test)]
mod tests {
    use super::labelled_stderr;

    #[test]
    fn stderr_is_one_trimmed_labelled_line() {
        assert_eq!(
            labelled_stderr(b"ls: cannot access 'x'\nsecond\n\n").as_deref(),
            Some("stderr: ls: cannot access 'x'\nsecond")
        );
        assert_eq!(labelled_stderr(b""), None);
        assert_eq!(labelled_stderr(b"\n  \n"), None);
    }
}
