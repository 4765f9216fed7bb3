#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use opsdesk_adapters::process::TokioShellBackend;
use opsdesk_core::execution::{ExecutionEvent, ExecutionOutcome};
use opsdesk_core::local_shell::{ShellBackend, ShellKind};
use opsdesk_core::notify::{LogNotifier, Notifier};
use opsdesk_core::shell_session::LocalShellSession;
use opsdesk_core::store::Store;
use opsdesk_core::stream_runner::LineStream;

fn session() -> (tempfile::TempDir, LocalShellSession<TokioShellBackend>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let (store, _) = Store::open(dir.path());
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let session = LocalShellSession::new(TokioShellBackend, Arc::new(store), notifier);
    (dir, session)
}

async fn collect(
    mut handle: opsdesk_core::session::ExecutionHandle,
) -> (Vec<String>, ExecutionOutcome) {
    let mut lines = Vec::new();
    while let Some(event) = handle.next_event().await {
        match event {
            ExecutionEvent::Line(line) => lines.push(line),
            ExecutionEvent::Finished { outcome, .. } => return (lines, outcome),
        }
    }
    panic!("handle ended without a terminal event");
}

#[tokio::test]
async fn process_stream_yields_lines_and_trailing_partial_line() {
    let mut stream = TokioShellBackend
        .spawn(ShellKind::Sh, "printf 'one\\ntwo\\nthree'")
        .await
        .expect("sh should start");

    let mut lines = Vec::new();
    while let Some(line) = stream.next_line().await.expect("readable output") {
        lines.push(line);
    }

    assert_eq!(lines, ["one", "two", "three"]);
    assert_eq!(stream.exit_code(), Some(0));
}

#[tokio::test]
async fn stderr_is_merged_into_the_output() {
    let (_dir, session) = session();

    let handle = session
        .execute(ShellKind::Sh, "echo out; echo err 1>&2")
        .expect("execution starts");
    let (mut lines, outcome) = collect(handle).await;
    lines.sort();

    assert_eq!(lines, ["err", "out"]);
    assert_eq!(outcome, ExecutionOutcome::completed("process finished"));
}

#[tokio::test]
async fn non_zero_exit_is_a_failure() {
    let (_dir, session) = session();

    let handle = session
        .execute(ShellKind::Sh, "echo before; exit 3")
        .expect("execution starts");
    let (lines, outcome) = collect(handle).await;

    assert_eq!(lines, ["before"]);
    assert_eq!(
        outcome,
        ExecutionOutcome::failed("process exited with status 3")
    );
}

#[tokio::test]
async fn stop_ends_a_long_running_command_without_further_output() {
    let (_dir, session) = session();

    let mut handle = session
        .execute(
            ShellKind::Sh,
            "while true; do echo tick; sleep 0.05; done",
        )
        .expect("execution starts");
    assert!(matches!(
        handle.next_event().await,
        Some(ExecutionEvent::Line(line)) if line == "tick"
    ));

    session.stop();
    let event = tokio::time::timeout(Duration::from_secs(5), handle.next_event())
        .await
        .expect("stop should finish the execution promptly");

    let Some(ExecutionEvent::Finished { outcome, summary }) = event else {
        panic!("no line may be delivered after stop");
    };
    assert_eq!(outcome, ExecutionOutcome::completed("process stopped"));
    assert!(summary.was_stopped);
    assert_eq!(handle.next_event().await, None);
}
