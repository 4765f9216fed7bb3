use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::execution::{ExecutionEvent, ExecutionOutcome, ExecutionSummary, ValidationError};
use crate::notify::{Notifier, NotifyLevel};
use crate::stats::StatKey;
use crate::store::Store;

/// Capacity of the per-execution event channel. A consumer that falls this
/// far behind back-pressures the producer.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("an execution is already running in this session")]
    Busy,
    #[error("remote shell session is not connected")]
    NotConnected,
    #[error("remote shell session is already connected to `{target}`")]
    AlreadyConnected { target: String },
}

/// Single-flight gate shared by a session and its running worker.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExecutionSlot {
    running: Arc<Mutex<Option<CancellationToken>>>,
}

impl ExecutionSlot {
    pub(crate) fn try_begin(&self) -> Result<RunningGuard, SessionError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(SessionError::Busy);
        }
        let token = CancellationToken::new();
        *running = Some(token.clone());
        Ok(RunningGuard {
            slot: self.clone(),
            token,
        })
    }

    pub(crate) fn state(&self) -> SessionState {
        if self.running.lock().is_some() {
            SessionState::Running
        } else {
            SessionState::Idle
        }
    }

    /// Cancels the running execution, if any. Returns whether there was one.
    pub(crate) fn stop(&self) -> bool {
        match self.running.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Marks the slot busy for as long as it lives; dropping it (normally or
/// during a panic unwind) returns the session to `Idle`.
#[derive(Debug)]
pub(crate) struct RunningGuard {
    slot: ExecutionSlot,
    token: CancellationToken,
}

impl RunningGuard {
    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        *self.slot.running.lock() = None;
    }
}

/// Spawns `work` as the execution's worker task. The guard is released
/// before the terminal event is sent, so a consumer that sees `Finished` can
/// immediately start the next execution.
pub(crate) fn spawn_execution<F, Fut>(guard: RunningGuard, work: F) -> ExecutionHandle
where
    F: FnOnce(CancellationToken, mpsc::Sender<ExecutionEvent>) -> Fut,
    Fut: Future<Output = (ExecutionOutcome, ExecutionSummary)> + Send + 'static,
{
    let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let cancellation = guard.token();
    let work = work(cancellation.clone(), events.clone());
    let task = tokio::spawn(async move {
        let (outcome, summary) = work.await;
        drop(guard);
        let _ = events
            .send(ExecutionEvent::Finished { outcome, summary })
            .await;
    });
    ExecutionHandle {
        events: receiver,
        cancellation,
        task: Some(task),
        finished: false,
    }
}

/// Receiving end of one execution.
///
/// Delivers lines in production order, each at most once, followed by exactly
/// one `Finished`. Once [`stop`](Self::stop) has been called no further
/// `Line` events are yielded, only the terminal event.
#[derive(Debug)]
pub struct ExecutionHandle {
    events: mpsc::Receiver<ExecutionEvent>,
    cancellation: CancellationToken,
    task: Option<JoinHandle<()>>,
    finished: bool,
}

impl ExecutionHandle {
    pub fn stop(&self) {
        self.cancellation.cancel();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub async fn next_event(&mut self) -> Option<ExecutionEvent> {
        if self.finished {
            return None;
        }
        loop {
            match self.events.recv().await {
                Some(ExecutionEvent::Line(_)) if self.cancellation.is_cancelled() => {}
                Some(event @ ExecutionEvent::Line(_)) => return Some(event),
                Some(event @ ExecutionEvent::Finished { .. }) => {
                    self.finished = true;
                    return Some(event);
                }
                None => {
                    self.finished = true;
                    return Some(self.abnormal_exit().await);
                }
            }
        }
    }

    /// Discards any remaining lines and returns the terminal event's parts.
    pub async fn wait(mut self) -> (ExecutionOutcome, ExecutionSummary) {
        while let Some(event) = self.next_event().await {
            if let ExecutionEvent::Finished { outcome, summary } = event {
                return (outcome, summary);
            }
        }
        (
            ExecutionOutcome::failed("execution ended without a result"),
            ExecutionSummary::default(),
        )
    }

    async fn abnormal_exit(&mut self) -> ExecutionEvent {
        let reason = match self.task.take() {
            Some(task) => match task.await {
                Err(join_error) if join_error.is_panic() => {
                    error!("execution worker panicked");
                    "internal error while executing command".to_string()
                }
                Err(_) => "execution was aborted".to_string(),
                Ok(()) => "execution ended without a result".to_string(),
            },
            None => "execution ended without a result".to_string(),
        };
        ExecutionEvent::Finished {
            outcome: ExecutionOutcome::failed(reason),
            summary: ExecutionSummary::default(),
        }
    }
}

/// Bumps a usage counter. A failed persist is logged and otherwise ignored.
pub(crate) fn record_stat(store: &Store, key: StatKey) {
    if let Err(error) = store.increment(key) {
        warn!(counter = %key, %error, "failed to persist usage counter");
    }
}

/// Completed outcomes are announced with their last output line, failures
/// with their reason.
pub(crate) fn notify_outcome(notifier: &dyn Notifier, title: &str, outcome: &ExecutionOutcome) {
    match outcome {
        ExecutionOutcome::Completed { output, .. } => {
            let summary_line = output.lines().last().unwrap_or_default();
            notifier.notify(NotifyLevel::Info, title, summary_line);
        }
        ExecutionOutcome::Failed { reason } => {
            notifier.notify(NotifyLevel::Error, title, reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{spawn_execution, ExecutionSlot, SessionError, SessionState};
    use crate::execution::{ExecutionEvent, ExecutionOutcome, ExecutionSummary};

    #[test]
    fn slot_rejects_second_execution_and_frees_on_drop() {
        let slot = ExecutionSlot::default();
        assert_eq!(slot.state(), SessionState::Idle);
        assert!(!slot.stop(), "stop while idle is a no-op");

        let guard = slot.try_begin().expect("first begin succeeds");
        assert_eq!(slot.state(), SessionState::Running);
        assert!(matches!(slot.try_begin(), Err(SessionError::Busy)));

        assert!(slot.stop());
        assert!(guard.token().is_cancelled());
        drop(guard);
        assert_eq!(slot.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn handle_yields_lines_then_finished_and_slot_is_idle() {
        let slot = ExecutionSlot::default();
        let guard = slot.try_begin().expect("begin");
        let mut handle = spawn_execution(guard, |_, events| async move {
            let _ = events.send(ExecutionEvent::Line("a".into())).await;
            (ExecutionOutcome::completed("done"), ExecutionSummary::default())
        });

        assert_eq!(
            handle.next_event().await,
            Some(ExecutionEvent::Line("a".into()))
        );
        let finished = handle.next_event().await.expect("terminal event");
        assert!(matches!(finished, ExecutionEvent::Finished { .. }));
        assert_eq!(slot.state(), SessionState::Idle);
        assert_eq!(handle.next_event().await, None);
    }

    #[tokio::test]
    async fn stopped_handle_suppresses_buffered_lines() {
        let slot = ExecutionSlot::default();
        let guard = slot.try_begin().expect("begin");
        let mut handle = spawn_execution(guard, |token, events| async move {
            for index in 0..5 {
                let _ = events.send(ExecutionEvent::Line(index.to_string())).await;
            }
            token.cancelled().await;
            (ExecutionOutcome::completed("stopped"), ExecutionSummary::default())
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop();
        let event = handle.next_event().await.expect("terminal event");
        assert_eq!(
            event,
            ExecutionEvent::Finished {
                outcome: ExecutionOutcome::completed("stopped"),
                summary: ExecutionSummary::default(),
            }
        );
    }

    #[tokio::test]
    async fn panicking_worker_surfaces_as_failure() {
        let slot = ExecutionSlot::default();
        let guard = slot.try_begin().expect("begin");
        let handle = spawn_execution(guard, |_, _| async move {
            let broken = true;
            if broken {
                panic!("backend bug");
            }
            (ExecutionOutcome::completed("unreachable"), ExecutionSummary::default())
        });

        let (outcome, _) = handle.wait().await;
        assert_eq!(
            outcome,
            ExecutionOutcome::failed("internal error while executing command")
        );
        assert_eq!(slot.state(), SessionState::Idle);
    }
}
