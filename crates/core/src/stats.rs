use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKey {
    DbConnections,
    DbSelectCount,
    DbInsertCount,
    DbUpdateCount,
    DbDeleteCount,
    SshConnections,
    SshCommandCount,
    CmdScriptCount,
    Ps1ScriptCount,
}

impl StatKey {
    pub const ALL: [Self; 9] = [
        Self::DbConnections,
        Self::DbSelectCount,
        Self::DbInsertCount,
        Self::DbUpdateCount,
        Self::DbDeleteCount,
        Self::SshConnections,
        Self::SshCommandCount,
        Self::CmdScriptCount,
        Self::Ps1ScriptCount,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DbConnections => "db_connections",
            Self::DbSelectCount => "db_select_count",
            Self::DbInsertCount => "db_insert_count",
            Self::DbUpdateCount => "db_update_count",
            Self::DbDeleteCount => "db_delete_count",
            Self::SshConnections => "ssh_connections",
            Self::SshCommandCount => "ssh_command_count",
            Self::CmdScriptCount => "cmd_script_count",
            Self::Ps1ScriptCount => "ps1_script_count",
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown counter `{0}`")]
pub struct UnknownStat(pub String);

impl FromStr for StatKey {
    type Err = UnknownStat;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == raw)
            .ok_or_else(|| UnknownStat(raw.to_string()))
    }
}

#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Monotonic usage counters. Only ever incremented by one or reset to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageStats {
    pub db_connections: u64,
    pub db_select_count: u64,
    pub db_insert_count: u64,
    pub db_update_count: u64,
    pub db_delete_count: u64,
    pub ssh_connections: u64,
    pub ssh_command_count: u64,
    pub cmd_script_count: u64,
    pub ps1_script_count: u64,
    pub last_update: NaiveDate,
}

impl Default for UsageStats {
    fn default() -> Self {
        Self {
            db_connections: 0,
            db_select_count: 0,
            db_insert_count: 0,
            db_update_count: 0,
            db_delete_count: 0,
            ssh_connections: 0,
            ssh_command_count: 0,
            cmd_script_count: 0,
            ps1_script_count: 0,
            last_update: today(),
        }
    }
}

impl UsageStats {
    #[must_use]
    pub fn get(&self, key: StatKey) -> u64 {
        match key {
            StatKey::DbConnections => self.db_connections,
            StatKey::DbSelectCount => self.db_select_count,
            StatKey::DbInsertCount => self.db_insert_count,
            StatKey::DbUpdateCount => self.db_update_count,
            StatKey::DbDeleteCount => self.db_delete_count,
            StatKey::SshConnections => self.ssh_connections,
            StatKey::SshCommandCount => self.ssh_command_count,
            StatKey::CmdScriptCount => self.cmd_script_count,
            StatKey::Ps1ScriptCount => self.ps1_script_count,
        }
    }

    pub fn increment(&mut self, key: StatKey) {
        let counter = match key {
            StatKey::DbConnections => &mut self.db_connections,
            StatKey::DbSelectCount => &mut self.db_select_count,
            StatKey::DbInsertCount => &mut self.db_insert_count,
            StatKey::DbUpdateCount => &mut self.db_update_count,
            StatKey::DbDeleteCount => &mut self.db_delete_count,
            StatKey::SshConnections => &mut self.ssh_connections,
            StatKey::SshCommandCount => &mut self.ssh_command_count,
            StatKey::CmdScriptCount => &mut self.cmd_script_count,
            StatKey::Ps1ScriptCount => &mut self.ps1_script_count,
        };
        *counter = counter.saturating_add(1);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn touch(&mut self) {
        self.last_update = today();
    }

    #[must_use]
    pub fn entries(&self) -> Vec<(StatKey, u64)> {
        StatKey::ALL
            .into_iter()
            .map(|key| (key, self.get(key)))
            .collect()
    }

    #[must_use]
    pub fn script_total(&self) -> u64 {
        self.cmd_script_count + self.ps1_script_count
    }
}
