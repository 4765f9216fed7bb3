use std::time::Duration;

use async_trait::async_trait;

use crate::execution::{validate_command, BackendError, RowSet, ValidationError};
use crate::params::ConnectionParams;
use crate::stats::StatKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlStatementKind {
    Select,
    Show,
    Describe,
    Insert,
    Update,
    Delete,
    Other,
}

impl SqlStatementKind {
    /// Classifies by leading keyword, ignoring case and leading whitespace.
    #[must_use]
    pub fn classify(sql: &str) -> Self {
        let upper = sql.trim_start().to_ascii_uppercase();
        if upper.starts_with("SELECT") {
            Self::Select
        } else if upper.starts_with("SHOW") {
            Self::Show
        } else if upper.starts_with("DESC") {
            Self::Describe
        } else if upper.starts_with("INSERT") {
            Self::Insert
        } else if upper.starts_with("UPDATE") {
            Self::Update
        } else if upper.starts_with("DELETE") {
            Self::Delete
        } else {
            Self::Other
        }
    }

    /// Read statements return a row set; everything else returns an
    /// affected-row count after commit.
    #[must_use]
    pub fn is_read(self) -> bool {
        matches!(self, Self::Select | Self::Show | Self::Describe)
    }

    #[must_use]
    pub fn stat_key(self) -> Option<StatKey> {
        match self {
            Self::Select => Some(StatKey::DbSelectCount),
            Self::Insert => Some(StatKey::DbInsertCount),
            Self::Update => Some(StatKey::DbUpdateCount),
            Self::Delete => Some(StatKey::DbDeleteCount),
            Self::Show | Self::Describe | Self::Other => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    text: String,
    kind: SqlStatementKind,
}

impl SqlStatement {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let text = validate_command(raw)?;
        let kind = SqlStatementKind::classify(&text);
        Ok(Self { text, kind })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> SqlStatementKind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlResult {
    Rows(RowSet),
    Affected(u64),
}

#[async_trait]
pub trait SqlBackend: Send + Sync {
    type Connection: Send;

    async fn connect(
        &self,
        params: &ConnectionParams,
        timeout: Duration,
    ) -> Result<Self::Connection, BackendError>;
    async fn ping(&self, connection: &mut Self::Connection) -> Result<(), BackendError>;
    async fn execute(
        &self,
        connection: &mut Self::Connection,
        statement: &SqlStatement,
    ) -> Result<SqlResult, BackendError>;
    async fn disconnect(&self, connection: Self::Connection) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::{SqlStatement, SqlStatementKind};
    use crate::execution::ValidationError;
    use crate::stats::StatKey;

    #[test]
    fn classification_ignores_case_and_leading_whitespace() {
        assert_eq!(SqlStatementKind::classify("  select 1"), SqlStatementKind::Select);
        assert_eq!(SqlStatementKind::classify("\nShow tables"), SqlStatementKind::Show);
        assert_eq!(
            SqlStatementKind::classify("describe users"),
            SqlStatementKind::Describe
        );
        assert_eq!(SqlStatementKind::classify("DESC users"), SqlStatementKind::Describe);
        assert_eq!(
            SqlStatementKind::classify("UPDATE t SET a = 1"),
            SqlStatementKind::Update
        );
        assert_eq!(
            SqlStatementKind::classify("create table t (id int)"),
            SqlStatementKind::Other
        );
    }

    #[test]
    fn read_path_is_select_show_and_desc_only() {
        assert!(SqlStatementKind::Select.is_read());
        assert!(SqlStatementKind::Show.is_read());
        assert!(SqlStatementKind::Describe.is_read());
        assert!(!SqlStatementKind::Update.is_read());
        assert!(!SqlStatementKind::Other.is_read());
    }

    #[test]
    fn counters_follow_statement_category() {
        assert_eq!(
            SqlStatementKind::Select.stat_key(),
            Some(StatKey::DbSelectCount)
        );
        assert_eq!(
            SqlStatementKind::Delete.stat_key(),
            Some(StatKey::DbDeleteCount)
        );
        assert_eq!(SqlStatementKind::Show.stat_key(), None);
    }

    #[test]
    fn empty_statement_is_a_validation_error() {
        assert_eq!(SqlStatement::parse("   "), Err(ValidationError::EmptyCommand));
        let statement = SqlStatement::parse("  SELECT 1 ").expect("valid statement");
        assert_eq!(statement.text(), "SELECT 1");
        assert_eq!(statement.kind(), SqlStatementKind::Select);
    }
}
