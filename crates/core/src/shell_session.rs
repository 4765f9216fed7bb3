use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::execution::{validate_command, ExecutionOutcome, ExecutionSummary};
use crate::local_shell::{ShellBackend, ShellKind};
use crate::notify::Notifier;
use crate::scripts::{save_script, ScriptError};
use crate::session::{
    notify_outcome, spawn_execution, ExecutionHandle, ExecutionSlot, SessionError, SessionState,
};
use crate::store::Store;
use crate::stream_runner::StreamRunner;

const NOTIFY_TITLE: &str = "Command";

/// Facade for the local command panel. Output is streamed line by line;
/// stopping kills the child process.
pub struct LocalShellSession<B: ShellBackend> {
    backend: Arc<B>,
    store: Arc<Store>,
    notifier: Arc<dyn Notifier>,
    slot: ExecutionSlot,
}

impl<B> LocalShellSession<B>
where
    B: ShellBackend + 'static,
{
    pub fn new(backend: B, store: Arc<Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend: Arc::new(backend),
            store,
            notifier,
            slot: ExecutionSlot::default(),
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.slot.state()
    }

    pub fn stop(&self) {
        if self.slot.stop() {
            info!("local command stop requested");
        }
    }

    pub fn execute(
        &self,
        shell: ShellKind,
        command: &str,
    ) -> Result<ExecutionHandle, SessionError> {
        let command = validate_command(command)?;
        let guard = self.slot.try_begin()?;

        let backend = Arc::clone(&self.backend);
        let notifier = Arc::clone(&self.notifier);

        Ok(spawn_execution(guard, move |token, events| async move {
            info!(%shell, command = %command, "starting local command");
            let mut stream = match backend.spawn(shell, &command).await {
                Ok(stream) => stream,
                Err(error) => {
                    warn!(%shell, %error, "failed to start local command");
                    let outcome = ExecutionOutcome::from(error);
                    notify_outcome(&*notifier, NOTIFY_TITLE, &outcome);
                    return (outcome, ExecutionSummary::default());
                }
            };

            let (outcome, summary) = StreamRunner::new("process")
                .run(&mut stream, &token, &events)
                .await;
            info!(
                lines = summary.lines_streamed,
                stopped = summary.was_stopped,
                exit_code = ?summary.exit_code,
                "local command finished"
            );
            notify_outcome(&*notifier, NOTIFY_TITLE, &outcome);
            (outcome, summary)
        }))
    }

    /// Saves editor contents as a script for `shell`; see [`save_script`].
    pub fn save_script(
        &self,
        shell: ShellKind,
        path: &Path,
        content: &str,
    ) -> Result<PathBuf, ScriptError> {
        save_script(&self.store, shell, path, content)
    }
}
