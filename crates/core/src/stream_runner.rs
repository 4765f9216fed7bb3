use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::execution::{BackendError, ExecutionEvent, ExecutionOutcome, ExecutionSummary};

/// Incremental output of a running command.
#[async_trait]
pub trait LineStream: Send {
    /// Next line of output, or `None` once the command has finished and all
    /// output (including a trailing partial line) has been returned.
    async fn next_line(&mut self) -> Result<Option<String>, BackendError>;

    /// Tears the command down. Called when the consumer stops early.
    async fn cancel(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Exit status, once known.
    fn exit_code(&self) -> Option<i32> {
        None
    }
}

/// Drives a [`LineStream`] into an event channel until the stream ends, the
/// token is cancelled, or the receiving side goes away.
#[derive(Debug, Clone, Copy)]
pub struct StreamRunner<'a> {
    label: &'a str,
}

impl<'a> StreamRunner<'a> {
    /// `label` prefixes failure messages, e.g. "process" or "remote command".
    #[must_use]
    pub fn new(label: &'a str) -> Self {
        Self { label }
    }

    pub async fn run<S: LineStream + ?Sized>(
        &self,
        stream: &mut S,
        cancellation: &CancellationToken,
        events: &mpsc::Sender<ExecutionEvent>,
    ) -> (ExecutionOutcome, ExecutionSummary) {
        let started_at = Instant::now();
        let mut lines_streamed = 0_u64;

        let stopped = loop {
            let next = tokio::select! {
                biased;
                () = cancellation.cancelled() => break true,
                next = stream.next_line() => next,
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => break false,
                Err(error) => {
                    let _ = stream.cancel().await;
                    let summary = ExecutionSummary {
                        lines_streamed,
                        was_stopped: false,
                        exit_code: stream.exit_code(),
                        elapsed: started_at.elapsed(),
                    };
                    return (ExecutionOutcome::from(error), summary);
                }
            };

            tokio::select! {
                biased;
                () = cancellation.cancelled() => break true,
                sent = events.send(ExecutionEvent::Line(line)) => {
                    if sent.is_err() {
                        debug!(label = self.label, "output receiver dropped, stopping stream");
                        break true;
                    }
                }
            }
            lines_streamed += 1;
        };

        if stopped {
            if let Err(error) = stream.cancel().await {
                debug!(label = self.label, %error, "stream cancel reported an error");
            }
        }

        let exit_code = stream.exit_code();
        let summary = ExecutionSummary {
            lines_streamed,
            was_stopped: stopped,
            exit_code,
            elapsed: started_at.elapsed(),
        };
        let outcome = match exit_code {
            _ if stopped => ExecutionOutcome::completed(format!("{} stopped", self.label)),
            Some(code) if code != 0 => {
                ExecutionOutcome::failed(format!("{} exited with status {code}", self.label))
            }
            _ => ExecutionOutcome::completed(format!("{} finished", self.label)),
        };
        (outcome, summary)
    }
}
