use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::execution::{validate_command, ExecutionOutcome, ExecutionSummary};
use crate::history::HistoryKind;
use crate::notify::{Notifier, NotifyLevel};
use crate::params::ConnectionParams;
use crate::remote_shell::{RemoteSession, RemoteShellBackend};
use crate::session::{
    notify_outcome, record_stat, spawn_execution, ExecutionHandle, ExecutionSlot, SessionError,
    SessionState,
};
use crate::stats::StatKey;
use crate::store::Store;
use crate::stream_runner::StreamRunner;

const NOTIFY_TITLE: &str = "SSH";

struct ActiveSession<S> {
    target: String,
    session: Arc<S>,
}

/// Facade for the SSH panel. One connection is opened explicitly, reused by
/// every command, and closed explicitly.
pub struct RemoteShellSession<B: RemoteShellBackend> {
    backend: B,
    store: Arc<Store>,
    notifier: Arc<dyn Notifier>,
    slot: ExecutionSlot,
    active: Mutex<Option<ActiveSession<B::Session>>>,
}

impl<B> RemoteShellSession<B>
where
    B: RemoteShellBackend + 'static,
{
    pub fn new(backend: B, store: Arc<Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            store,
            notifier,
            slot: ExecutionSlot::default(),
            active: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.slot.state()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.active.lock().is_some()
    }

    /// `user@host:port` of the open connection.
    #[must_use]
    pub fn target(&self) -> Option<String> {
        self.active.lock().as_ref().map(|active| active.target.clone())
    }

    /// Opens the connection using the `ssh_timeout` setting. Authentication
    /// and network failures come back as a `Failed` outcome.
    pub async fn connect(
        &self,
        params: &ConnectionParams,
    ) -> Result<ExecutionOutcome, SessionError> {
        params.validate()?;
        if let Some(target) = self.target() {
            return Err(SessionError::AlreadyConnected { target });
        }
        let _guard = self.slot.try_begin()?;

        let target = params.target();
        let timeout = self.store.settings().ssh_timeout();
        info!(endpoint = %target, timeout_secs = timeout.as_secs(), "opening ssh connection");

        let outcome = match self.backend.connect(params, timeout).await {
            Ok(session) => {
                record_stat(&self.store, StatKey::SshConnections);
                *self.active.lock() = Some(ActiveSession {
                    target: target.clone(),
                    session: Arc::new(session),
                });
                ExecutionOutcome::completed(format!("connected to {target}"))
            }
            Err(error) => {
                warn!(endpoint = %target, %error, "ssh connection failed");
                error.into()
            }
        };
        notify_outcome(&*self.notifier, NOTIFY_TITLE, &outcome);
        Ok(outcome)
    }

    /// Runs `command` on the open connection, streaming its output.
    ///
    /// The command is recorded in the SSH history and counted before it runs.
    pub fn execute(&self, command: &str) -> Result<ExecutionHandle, SessionError> {
        let command = validate_command(command)?;
        let session = self
            .active
            .lock()
            .as_ref()
            .map(|active| Arc::clone(&active.session))
            .ok_or(SessionError::NotConnected)?;
        let guard = self.slot.try_begin()?;

        if let Err(error) = self.store.add_history(HistoryKind::Ssh, &command) {
            warn!(%error, "failed to record ssh history");
        }
        record_stat(&self.store, StatKey::SshCommandCount);

        let notifier = Arc::clone(&self.notifier);
        Ok(spawn_execution(guard, move |token, events| async move {
            info!(command = %command, "running remote command");
            let mut stream = match session.exec(&command).await {
                Ok(stream) => stream,
                Err(error) => {
                    warn!(%error, "failed to start remote command");
                    let outcome = ExecutionOutcome::from(error);
                    notify_outcome(&*notifier, NOTIFY_TITLE, &outcome);
                    return (outcome, ExecutionSummary::default());
                }
            };

            let (outcome, summary) = StreamRunner::new("remote command")
                .run(&mut stream, &token, &events)
                .await;
            debug!(
                lines = summary.lines_streamed,
                stopped = summary.was_stopped,
                exit_code = ?summary.exit_code,
                "remote command finished"
            );
            notify_outcome(&*notifier, NOTIFY_TITLE, &outcome);
            (outcome, summary)
        }))
    }

    pub fn stop(&self) {
        if self.slot.stop() {
            info!("remote command stop requested");
        }
    }

    /// Stops any running command and closes the connection. Returns whether
    /// a connection was open.
    pub async fn close(&self) -> bool {
        self.stop();
        let active = self.active.lock().take();
        let Some(active) = active else {
            return false;
        };
        if let Err(error) = active.session.close().await {
            debug!(endpoint = %active.target, %error, "ssh disconnect reported an error");
        }
        info!(endpoint = %active.target, "ssh connection closed");
        self.notifier.notify(
            NotifyLevel::Info,
            NOTIFY_TITLE,
            &format!("disconnected from {}", active.target),
        );
        true
    }
}
