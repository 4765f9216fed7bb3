use std::sync::Arc;
use std::time::Duration;

use opsdesk_adapters::mysql::MysqlSqlBackend;
use opsdesk_core::execution::ExecutionOutcome;
use opsdesk_core::history::HistoryKind;
use opsdesk_core::notify::{LogNotifier, Notifier};
use opsdesk_core::params::{ConnectionParams, DEFAULT_MYSQL_PORT};
use opsdesk_core::sql::{SqlBackend, SqlResult, SqlStatement};
use opsdesk_core::sql_session::SqlSession;
use opsdesk_core::stats::StatKey;
use opsdesk_core::store::Store;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn mysql_integration_enabled() -> bool {
    matches!(
        std::env::var("OPSDESK_RUN_MYSQL_INTEGRATION").ok().as_deref(),
        Some("1")
    )
}

fn integration_params(database: Option<&str>) -> ConnectionParams {
    let host = std::env::var("OPSDESK_TEST_DB_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let user = std::env::var("OPSDESK_TEST_DB_USER").unwrap_or_else(|_| "root".to_string());
    let password = std::env::var("OPSDESK_TEST_DB_PASSWORD").unwrap_or_default();
    let port = std::env::var("OPSDESK_TEST_DB_PORT")
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(DEFAULT_MYSQL_PORT);

    ConnectionParams::new(host, port, user)
        .with_secret(password)
        .with_database(database.unwrap_or_default())
}

async fn execute_sql(backend: &MysqlSqlBackend, params: &ConnectionParams, sql: &str) -> SqlResult {
    let statement = SqlStatement::parse(sql).expect("statement should be valid");
    let mut connection = backend
        .connect(params, CONNECT_TIMEOUT)
        .await
        .expect("connect should succeed");
    let result = backend
        .execute(&mut connection, &statement)
        .await
        .expect("statement should succeed");
    backend
        .disconnect(connection)
        .await
        .expect("disconnect should succeed");
    result
}

#[tokio::test(flavor = "current_thread")]
async fn mysql_backend_read_and_write_paths() {
    if !mysql_integration_enabled() {
        return;
    }

    let database = "opsdesk_adapters_cov";
    let backend = MysqlSqlBackend;

    execute_sql(
        &backend,
        &integration_params(None),
        &format!("CREATE DATABASE IF NOT EXISTS `{database}`"),
    )
    .await;

    let params = integration_params(Some(database));
    let mut connection = backend
        .connect(&params, CONNECT_TIMEOUT)
        .await
        .expect("connect should succeed");
    backend
        .ping(&mut connection)
        .await
        .expect("ping should succeed");
    backend
        .disconnect(connection)
        .await
        .expect("disconnect should succeed");

    execute_sql(&backend, &params, "DROP TABLE IF EXISTS integration_users").await;
    execute_sql(
        &backend,
        &params,
        "CREATE TABLE integration_users (\
         id BIGINT NOT NULL PRIMARY KEY,\
         email VARCHAR(64) NOT NULL,\
         age INT NULL\
         )",
    )
    .await;

    let inserted = execute_sql(
        &backend,
        &params,
        "INSERT INTO integration_users (id, email, age) VALUES \
         (1, 'a@example.com', 22), (2, 'b@example.com', NULL)",
    )
    .await;
    assert_eq!(inserted, SqlResult::Affected(2));

    let updated = execute_sql(
        &backend,
        &params,
        "update integration_users set age = 23 where id = 1",
    )
    .await;
    assert_eq!(updated, SqlResult::Affected(1));

    let SqlResult::Rows(rows) = execute_sql(
        &backend,
        &params,
        "  select id, email, age from integration_users order by id",
    )
    .await
    else {
        panic!("select should return rows");
    };
    assert_eq!(rows.columns, ["id", "email", "age"]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.rows[0].values, ["1", "a@example.com", "23"]);
    assert_eq!(rows.rows[1].values[2], "NULL");

    let SqlResult::Rows(described) =
        execute_sql(&backend, &params, "DESC integration_users").await
    else {
        panic!("describe should return rows");
    };
    assert_eq!(described.len(), 3);

    execute_sql(&backend, &params, "DROP TABLE IF EXISTS integration_users").await;
}

#[tokio::test(flavor = "current_thread")]
async fn select_one_through_the_session_updates_store() {
    if !mysql_integration_enabled() {
        return;
    }

    let dir = tempfile::tempdir().expect("temp dir");
    let (store, _) = Store::open(dir.path());
    let store = Arc::new(store);
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let session = SqlSession::new(MysqlSqlBackend, Arc::clone(&store), notifier);

    let (outcome, _) = session
        .execute(&integration_params(None), "SELECT 1")
        .expect("execution should start")
        .wait()
        .await;

    let ExecutionOutcome::Completed { rows, .. } = outcome else {
        panic!("SELECT 1 should complete");
    };
    assert_eq!(rows.expect("row set").len(), 1);
    assert_eq!(store.stat(StatKey::DbSelectCount), 1);
    assert_eq!(store.history(HistoryKind::Sql).latest(), Some("SELECT 1"));
}

#[tokio::test(flavor = "current_thread")]
async fn wrong_password_is_a_failed_outcome() {
    if !mysql_integration_enabled() {
        return;
    }

    let dir = tempfile::tempdir().expect("temp dir");
    let (store, _) = Store::open(dir.path());
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let session = SqlSession::new(MysqlSqlBackend, Arc::new(store), notifier);
    let params = integration_params(None).with_secret("definitely-not-the-password");

    let outcome = session
        .test_connection(&params)
        .await
        .expect("params are valid");

    assert!(!outcome.is_completed());
}
