use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryKind {
    Sql,
    Ssh,
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sql => "sql",
            Self::Ssh => "ssh",
        })
    }
}

fn default_max_count() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

/// Ordered, deduplicated, capacity-bounded list of commands. Oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandHistory {
    #[serde(default)]
    commands: Vec<String>,
    #[serde(default = "default_max_count")]
    max_count: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl CommandHistory {
    #[must_use]
    pub fn with_capacity(max_count: usize) -> Self {
        Self {
            commands: Vec::new(),
            max_count: max_count.max(1),
        }
    }

    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Newest first, the order a history picker shows them in.
    pub fn recent(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().rev().map(String::as_str)
    }

    #[must_use]
    pub fn latest(&self) -> Option<&str> {
        self.commands.last().map(String::as_str)
    }

    #[must_use]
    pub fn max_count(&self) -> usize {
        self.max_count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[must_use]
    pub fn contains(&self, command: &str) -> bool {
        self.commands.iter().any(|existing| existing == command)
    }

    /// Appends `command` unless it is blank or already present. Returns
    /// whether the list changed.
    pub fn push(&mut self, command: &str) -> bool {
        if command.trim().is_empty() || self.contains(command) {
            return false;
        }
        self.commands.push(command.to_string());
        self.enforce_capacity();
        true
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Repairs a document read from disk: drops blanks and later duplicates,
    /// then trims to capacity.
    pub fn normalize(&mut self) {
        if self.max_count == 0 {
            self.max_count = DEFAULT_HISTORY_CAPACITY;
        }
        let mut seen = std::collections::HashSet::new();
        self.commands
            .retain(|command| !command.trim().is_empty() && seen.insert(command.clone()));
        self.enforce_capacity();
    }

    fn enforce_capacity(&mut self) {
        if self.commands.len() > self.max_count {
            let excess = self.commands.len() - self.max_count;
            self.commands.drain(..excess);
        }
    }
}
