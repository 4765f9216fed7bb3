use std::time::Duration;

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Row, Value};
use opsdesk_core::execution::{BackendError, QueryRow, RowSet};
use opsdesk_core::params::ConnectionParams;
use opsdesk_core::sql::{SqlBackend, SqlResult, SqlStatement};
use tracing::debug;

/// MySQL-protocol backend. Every call to `connect` opens a fresh connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlSqlBackend;

#[async_trait]
impl SqlBackend for MysqlSqlBackend {
    type Connection = Conn;

    async fn connect(
        &self,
        params: &ConnectionParams,
        timeout: Duration,
    ) -> Result<Self::Connection, BackendError> {
        match tokio::time::timeout(timeout, Conn::new(opts_from_params(params))).await {
            Ok(connection) => connection.map_err(to_backend_error),
            Err(_) => Err(BackendError::new(format!(
                "connection to {} timed out after {}s",
                params.target(),
                timeout.as_secs()
            ))),
        }
    }

    async fn ping(&self, connection: &mut Self::Connection) -> Result<(), BackendError> {
        connection.ping().await.map_err(to_backend_error)
    }

    async fn execute(
        &self,
        connection: &mut Self::Connection,
        statement: &SqlStatement,
    ) -> Result<SqlResult, BackendError> {
        if statement.kind().is_read() {
            let mut result = connection
                .query_iter(statement.text())
                .await
                .map_err(to_backend_error)?;
            let columns = result
                .columns()
                .map(|columns| {
                    columns
                        .iter()
                        .map(|column| column.name_str().into_owned())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let rows = result
                .collect::<Row>()
                .await
                .map_err(to_backend_error)?
                .into_iter()
                .map(row_to_query_row)
                .collect::<Vec<_>>();
            result.drop_result().await.map_err(to_backend_error)?;
            debug!(rows = rows.len(), "read statement returned");
            return Ok(SqlResult::Rows(RowSet::new(columns, rows)));
        }

        connection
            .query_drop(statement.text())
            .await
            .map_err(to_backend_error)?;
        let affected = connection.affected_rows();
        connection
            .query_drop("COMMIT")
            .await
            .map_err(to_backend_error)?;
        Ok(SqlResult::Affected(affected))
    }

    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BackendError> {
        connection.disconnect().await.map_err(to_backend_error)
    }
}

fn opts_from_params(params: &ConnectionParams) -> OptsBuilder {
    let mut builder = OptsBuilder::default()
        .ip_or_hostname(params.host.clone())
        .tcp_port(params.port)
        .user(Some(params.username.clone()));

    if !params.secret().is_empty() {
        builder = builder.pass(Some(params.secret().to_string()));
    }

    if let Some(database) = &params.database {
        builder = builder.db_name(Some(database.clone()));
    }

    builder
}

fn row_to_query_row(row: Row) -> QueryRow {
    let values = row
        .unwrap()
        .into_iter()
        .map(mysql_value_to_string)
        .collect::<Vec<_>>();
    QueryRow::new(values)
}

fn mysql_value_to_string(value: Value) -> String {
    match value {
        Value::NULL => "NULL".to_string(),
        Value::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Value::Int(value) => value.to_string(),
        Value::UInt(value) => value.to_string(),
        Value::Float(value) => value.to_string(),
        Value::Double(value) => value.to_string(),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            if hour == 0 && minute == 0 && second == 0 && micros == 0 {
                format!("{year:04}-{month:02}-{day:02}")
            } else {
                format!(
                    "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}"
                )
            }
        }
        Value::Time(is_negative, days, hours, minutes, seconds, micros) => {
            let sign = if is_negative { "-" } else { "" };
            let hours = u32::from(hours) + days * 24;
            format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
        }
    }
}

fn to_backend_error(error: mysql_async::Error) -> BackendError {
    BackendError::new(error.to_string())
}
