use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::execution::{ExecutionOutcome, ExecutionSummary};
use crate::history::HistoryKind;
use crate::notify::Notifier;
use crate::params::ConnectionParams;
use crate::session::{
    notify_outcome, record_stat, spawn_execution, ExecutionHandle, ExecutionSlot, SessionError,
    SessionState,
};
use crate::sql::{SqlBackend, SqlResult, SqlStatement};
use crate::stats::StatKey;
use crate::store::Store;

const NOTIFY_TITLE: &str = "SQL";

/// Facade for the SQL panel: one statement in flight at a time, each on a
/// fresh connection.
pub struct SqlSession<B: SqlBackend> {
    backend: Arc<B>,
    store: Arc<Store>,
    notifier: Arc<dyn Notifier>,
    slot: ExecutionSlot,
}

impl<B> SqlSession<B>
where
    B: SqlBackend + 'static,
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
            info!("sql execution stop requested");
        }
    }

    /// Starts `sql` against the server described by `params`.
    ///
    /// The statement is recorded in the SQL history before the outcome is
    /// known. The returned handle yields a single `Finished` event.
    pub fn execute(
        &self,
        params: &ConnectionParams,
        sql: &str,
    ) -> Result<ExecutionHandle, SessionError> {
        let statement = SqlStatement::parse(sql)?;
        params.validate()?;
        let guard = self.slot.try_begin()?;

        if let Err(error) = self.store.add_history(HistoryKind::Sql, statement.text()) {
            warn!(%error, "failed to record sql history");
        }

        let backend = Arc::clone(&self.backend);
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        let params = params.clone();
        let timeout = store.settings().sql_timeout();

        Ok(spawn_execution(guard, move |token, _events| async move {
            let started_at = Instant::now();
            info!(endpoint = %params.target(), kind = ?statement.kind(), "executing sql statement");
            let (outcome, was_stopped) = tokio::select! {
                biased;
                () = token.cancelled() => (ExecutionOutcome::completed("query stopped"), true),
                outcome = run_statement(&*backend, &store, &params, timeout, &statement) => {
                    (outcome, false)
                }
            };
            notify_outcome(&*notifier, NOTIFY_TITLE, &outcome);
            let summary = ExecutionSummary {
                was_stopped,
                elapsed: started_at.elapsed(),
                ..ExecutionSummary::default()
            };
            (outcome, summary)
        }))
    }

    /// Connects, pings and disconnects. Counts as a database connection.
    pub async fn test_connection(
        &self,
        params: &ConnectionParams,
    ) -> Result<ExecutionOutcome, SessionError> {
        params.validate()?;
        let _guard = self.slot.try_begin()?;
        let timeout = self.store.settings().sql_timeout();

        info!(endpoint = %params.target(), "testing database connection");
        let outcome = match self.backend.connect(params, timeout).await {
            Ok(mut connection) => {
                record_stat(&self.store, StatKey::DbConnections);
                let pinged = self.backend.ping(&mut connection).await;
                if let Err(error) = self.backend.disconnect(connection).await {
                    debug!(%error, "disconnect after connection test failed");
                }
                match pinged {
                    Ok(()) => ExecutionOutcome::completed(format!(
                        "connection to {} succeeded",
                        params.target()
                    )),
                    Err(error) => error.into(),
                }
            }
            Err(error) => error.into(),
        };
        notify_outcome(&*self.notifier, NOTIFY_TITLE, &outcome);
        Ok(outcome)
    }
}

async fn run_statement<B: SqlBackend>(
    backend: &B,
    store: &Store,
    params: &ConnectionParams,
    timeout: std::time::Duration,
    statement: &SqlStatement,
) -> ExecutionOutcome {
    let mut connection = match backend.connect(params, timeout).await {
        Ok(connection) => connection,
        Err(error) => {
            warn!(endpoint = %params.target(), %error, "database connection failed");
            return error.into();
        }
    };
    record_stat(store, StatKey::DbConnections);

    let result = backend.execute(&mut connection, statement).await;
    if let Some(key) = statement.kind().stat_key() {
        record_stat(store, key);
    }
    if let Err(error) = backend.disconnect(connection).await {
        debug!(%error, "database disconnect failed");
    }

    match result {
        Ok(SqlResult::Rows(rows)) => ExecutionOutcome::Completed {
            output: rows.render(),
            rows: Some(rows),
            rows_affected: None,
        },
        Ok(SqlResult::Affected(count)) => ExecutionOutcome::Completed {
            output: format!("{count} row(s) affected"),
            rows: None,
            rows_affected: Some(count),
        },
        Err(error) => {
            warn!(%error, "sql statement failed");
            error.into()
        }
    }
}
