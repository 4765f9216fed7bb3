use std::fmt::Write as _;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("command must not be empty")]
    EmptyCommand,
    #[error("connection field `{0}` must not be empty")]
    MissingField(&'static str),
    #[error("port must be a positive integer")]
    InvalidPort,
}

/// Opaque failure reported by a client library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Trims a command and rejects it when nothing is left.
pub fn validate_command(command: &str) -> Result<String, ValidationError> {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyCommand);
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRow {
    pub values: Vec<String>,
}

impl QueryRow {
    #[must_use]
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<QueryRow>,
}

impl RowSet {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<QueryRow>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Tab-separated text: a header line, then one line per row.
    #[must_use]
    pub fn render(&self) -> String {
        let mut rendered = self.columns.join("\t");
        for row in &self.rows {
            if !rendered.is_empty() {
                rendered.push('\n');
            }
            rendered.push_str(&row.values.join("\t"));
        }
        if !rendered.is_empty() {
            rendered.push('\n');
        }
        let _ = write!(rendered, "({} row(s))", self.rows.len());
        rendered
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed {
        output: String,
        rows: Option<RowSet>,
        rows_affected: Option<u64>,
    },
    Failed {
        reason: String,
    },
}

impl ExecutionOutcome {
    #[must_use]
    pub fn completed(output: impl Into<String>) -> Self {
        Self::Completed {
            output: output.into(),
            rows: None,
            rows_affected: None,
        }
    }

    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// The single human-readable message for this outcome.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Completed { output, .. } => output,
            Self::Failed { reason } => reason,
        }
    }
}

impl From<BackendError> for ExecutionOutcome {
    fn from(error: BackendError) -> Self {
        Self::Failed {
            reason: error.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionSummary {
    pub lines_streamed: u64,
    pub was_stopped: bool,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

/// What an execution handle yields: any number of lines, then exactly one
/// `Finished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    Line(String),
    Finished {
        outcome: ExecutionOutcome,
        summary: ExecutionSummary,
    },
}
