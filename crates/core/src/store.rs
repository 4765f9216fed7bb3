use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::history::{CommandHistory, HistoryKind};
use crate::json_document::{load_or_default, write_atomic, DocumentError, LoadStatus};
use crate::paths::{default_config_dir, PathsError};
use crate::settings::{AppSettings, SettingKey, SettingsError};
use crate::stats::{StatKey, UsageStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Config,
    Stats,
    SshHistory,
    SqlHistory,
}

impl DocumentKind {
    pub const ALL: [Self; 4] = [Self::Config, Self::Stats, Self::SshHistory, Self::SqlHistory];

    #[must_use]
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Config => "config.json",
            Self::Stats => "stats.json",
            Self::SshHistory => "ssh_history.json",
            Self::SqlHistory => "sql_history.json",
        }
    }
}

impl From<HistoryKind> for DocumentKind {
    fn from(kind: HistoryKind) -> Self {
        match kind {
            HistoryKind::Sql => Self::SqlHistory,
            HistoryKind::Ssh => Self::SshHistory,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Config => "config",
            Self::Stats => "stats",
            Self::SshHistory => "ssh_history",
            Self::SqlHistory => "sql_history",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to resolve config directory: {0}")]
    Paths(#[from] PathsError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Result of loading one document, kept so callers can surface resets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub kind: DocumentKind,
    pub path: PathBuf,
    pub status: LoadStatus,
}

/// Owner of every persisted document.
///
/// Each document sits behind its own lock, and a mutation keeps that lock
/// until the full rewrite has hit the disk, so concurrent sessions never
/// interleave writes to the same file.
#[derive(Debug)]
pub struct Store {
    dir: PathBuf,
    settings: Mutex<AppSettings>,
    stats: Mutex<UsageStats>,
    ssh_history: Mutex<CommandHistory>,
    sql_history: Mutex<CommandHistory>,
}

impl Store {
    pub fn open_default() -> Result<(Self, Vec<LoadReport>), StoreError> {
        Ok(Self::open(default_config_dir()?))
    }

    /// Loads all documents from `dir`. Never fails: unreadable documents are
    /// replaced by their defaults and re-persisted, and the returned reports
    /// say which ones.
    pub fn open(dir: impl Into<PathBuf>) -> (Self, Vec<LoadReport>) {
        let store = Self {
            dir: dir.into(),
            settings: Mutex::new(AppSettings::default()),
            stats: Mutex::new(UsageStats::default()),
            ssh_history: Mutex::new(CommandHistory::default()),
            sql_history: Mutex::new(CommandHistory::default()),
        };
        let reports = DocumentKind::ALL
            .into_iter()
            .map(|kind| LoadReport {
                kind,
                path: store.path(kind),
                status: store.load(kind),
            })
            .collect();
        (store, reports)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path(&self, kind: DocumentKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Re-reads `kind` from disk, self-healing to defaults on failure.
    pub fn load(&self, kind: DocumentKind) -> LoadStatus {
        let path = self.path(kind);
        let status = match kind {
            DocumentKind::Config => {
                let (settings, status) = load_or_default(&path, AppSettings::default);
                *self.settings.lock() = settings;
                status
            }
            DocumentKind::Stats => {
                let (stats, status) = load_or_default(&path, UsageStats::default);
                *self.stats.lock() = stats;
                status
            }
            DocumentKind::SshHistory | DocumentKind::SqlHistory => {
                let (mut history, status) =
                    load_or_default::<CommandHistory, _>(&path, CommandHistory::default);
                history.normalize();
                *self.history_slot(kind) = history;
                status
            }
        };

        match &status {
            LoadStatus::Loaded => debug!(document = %kind, path = %path.display(), "loaded"),
            LoadStatus::Created => debug!(document = %kind, "document missing, using defaults"),
            LoadStatus::Reset { reason } => {
                warn!(document = %kind, %reason, "document unreadable, reset to defaults");
            }
        }

        if status.needs_persist() {
            if let Err(error) = self.save(kind) {
                warn!(document = %kind, %error, "failed to persist default document");
            }
        }
        status
    }

    pub fn save(&self, kind: DocumentKind) -> Result<(), StoreError> {
        let path = self.path(kind);
        match kind {
            DocumentKind::Config => write_atomic(&path, &*self.settings.lock())?,
            DocumentKind::Stats => {
                let mut stats = self.stats.lock();
                stats.touch();
                write_atomic(&path, &*stats)?;
            }
            DocumentKind::SshHistory | DocumentKind::SqlHistory => {
                write_atomic(&path, &*self.history_slot(kind))?;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn settings(&self) -> AppSettings {
        self.settings.lock().clone()
    }

    #[must_use]
    pub fn setting(&self, key: SettingKey) -> Value {
        self.settings.lock().get(key)
    }

    pub fn set_setting(&self, key: SettingKey, value: impl Into<Value>) -> Result<(), StoreError> {
        let mut settings = self.settings.lock();
        let mut updated = settings.clone();
        updated.set(key, value)?;
        write_atomic(&self.path(DocumentKind::Config), &updated)?;
        *settings = updated;
        Ok(())
    }

    #[must_use]
    pub fn stats(&self) -> UsageStats {
        self.stats.lock().clone()
    }

    #[must_use]
    pub fn stat(&self, key: StatKey) -> u64 {
        self.stats.lock().get(key)
    }

    pub fn increment(&self, key: StatKey) -> Result<(), StoreError> {
        let mut stats = self.stats.lock();
        write_through(&self.path(DocumentKind::Stats), &mut *stats, |stats| {
            stats.increment(key);
            stats.touch();
        })
    }

    /// By-name increment. Unknown counter names are ignored; returns whether
    /// a counter was bumped.
    pub fn increment_named(&self, name: &str) -> Result<bool, StoreError> {
        let Ok(key) = name.parse::<StatKey>() else {
            debug!(counter = name, "ignoring increment of unknown counter");
            return Ok(false);
        };
        self.increment(key)?;
        Ok(true)
    }

    pub fn reset_stats(&self) -> Result<(), StoreError> {
        let mut stats = self.stats.lock();
        write_through(&self.path(DocumentKind::Stats), &mut *stats, UsageStats::reset)
    }

    #[must_use]
    pub fn history(&self, kind: HistoryKind) -> CommandHistory {
        self.history_slot(kind.into()).clone()
    }

    /// Records `command`; blank strings and exact duplicates leave the list
    /// (and the file) untouched. Returns whether the list changed.
    pub fn add_history(&self, kind: HistoryKind, command: &str) -> Result<bool, StoreError> {
        let document = DocumentKind::from(kind);
        let mut history = self.history_slot(document);
        let mut updated = history.clone();
        if !updated.push(command) {
            return Ok(false);
        }
        write_atomic(&self.path(document), &updated)?;
        *history = updated;
        Ok(true)
    }

    pub fn clear_history(&self, kind: HistoryKind) -> Result<(), StoreError> {
        let document = DocumentKind::from(kind);
        let mut history = self.history_slot(document);
        write_through(&self.path(document), &mut *history, CommandHistory::clear)
    }

    fn history_slot(&self, kind: DocumentKind) -> parking_lot::MutexGuard<'_, CommandHistory> {
        match kind {
            DocumentKind::SqlHistory => self.sql_history.lock(),
            _ => self.ssh_history.lock(),
        }
    }
}

/// Applies `change` to a copy of `current` and swaps the copy in only once it
/// is on disk, so a failed write leaves memory matching the file.
fn write_through<T>(
    path: &Path,
    current: &mut T,
    change: impl FnOnce(&mut T),
) -> Result<(), StoreError>
where
    T: Clone + Serialize,
{
    let mut updated = current.clone();
    change(&mut updated);
    write_atomic(path, &updated)?;
    *current = updated;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::TempDir;

    use super::{DocumentKind, Store};
    use crate::history::{HistoryKind, DEFAULT_HISTORY_CAPACITY};
    use crate::json_document::LoadStatus;
    use crate::settings::SettingKey;
    use crate::stats::StatKey;

    #[test]
    fn first_open_creates_every_document_with_defaults() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let (store, reports) = Store::open(temp_dir.path());

        assert_eq!(reports.len(), 4);
        assert!(reports
            .iter()
            .all(|report| report.status == LoadStatus::Created));
        for kind in DocumentKind::ALL {
            assert!(store.path(kind).exists(), "{kind} should be persisted");
        }

        let config: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(store.path(DocumentKind::Config)).expect("config readable"),
        )
        .expect("config is JSON");
        assert_eq!(config["theme"], json!("light"));
        assert_eq!(config["sql_timeout"], json!(30));

        let history: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(store.path(DocumentKind::SqlHistory)).expect("history readable"),
        )
        .expect("history is JSON");
        assert_eq!(history, json!({ "commands": [], "max_count": 50 }));
    }

    #[test]
    fn corrupted_document_resets_and_is_rewritten_as_valid_json() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        fs::write(temp_dir.path().join("stats.json"), "{\"db_connections\": ")
            .expect("failed to seed corrupt file");

        let (store, reports) = Store::open(temp_dir.path());
        let stats_report = reports
            .iter()
            .find(|report| report.kind == DocumentKind::Stats)
            .expect("stats report");
        assert!(matches!(stats_report.status, LoadStatus::Reset { .. }));
        assert_eq!(store.stat(StatKey::DbConnections), 0);

        let raw = fs::read_to_string(store.path(DocumentKind::Stats)).expect("stats readable");
        let parsed: serde_json::Value = serde_json::from_str(&raw).expect("stats now valid");
        assert_eq!(parsed["db_connections"], json!(0));
    }

    #[test]
    fn increments_persist_and_survive_reopen() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let (store, _) = Store::open(temp_dir.path());
        for _ in 0..3 {
            store
                .increment(StatKey::DbSelectCount)
                .expect("increment should persist");
        }
        assert!(!store
            .increment_named("db_truncate_count")
            .expect("unknown counter is not an error"));
        assert!(store
            .increment_named("ssh_connections")
            .expect("known counter"));

        let (reopened, reports) = Store::open(temp_dir.path());
        assert!(reports
            .iter()
            .all(|report| report.status == LoadStatus::Loaded));
        assert_eq!(reopened.stat(StatKey::DbSelectCount), 3);
        assert_eq!(reopened.stat(StatKey::SshConnections), 1);
        assert_eq!(reopened.stat(StatKey::DbInsertCount), 0);

        reopened.reset_stats().expect("reset should persist");
        let (after_reset, _) = Store::open(temp_dir.path());
        assert_eq!(after_reset.stat(StatKey::DbSelectCount), 0);
    }

    #[test]
    fn settings_set_persists_and_get_falls_back() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        fs::write(temp_dir.path().join("config.json"), r#"{ "theme": "dark" }"#)
            .expect("failed to seed config");

        let (store, _) = Store::open(temp_dir.path());
        assert_eq!(store.setting(SettingKey::Theme), json!("dark"));
        assert_eq!(store.setting(SettingKey::FontSize), json!(14));

        store
            .set_setting(SettingKey::SshTimeout, 25)
            .expect("set should persist");
        assert!(store.set_setting(SettingKey::SshTimeout, "slow").is_err());

        let (reopened, _) = Store::open(temp_dir.path());
        assert_eq!(reopened.settings().ssh_timeout().as_secs(), 25);
        assert_eq!(reopened.setting(SettingKey::Theme), json!("dark"));
    }

    #[test]
    fn history_is_bounded_deduplicated_and_clearable() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let (store, _) = Store::open(temp_dir.path());

        for index in 1..=DEFAULT_HISTORY_CAPACITY + 1 {
            store
                .add_history(HistoryKind::Ssh, &format!("uptime #{index}"))
                .expect("history add should persist");
        }
        assert!(!store
            .add_history(HistoryKind::Ssh, "uptime #51")
            .expect("duplicate add is fine"));

        let (reopened, _) = Store::open(temp_dir.path());
        let ssh = reopened.history(HistoryKind::Ssh);
        assert_eq!(ssh.len(), DEFAULT_HISTORY_CAPACITY);
        assert!(!ssh.contains("uptime #1"));
        assert_eq!(ssh.latest(), Some("uptime #51"));
        assert!(reopened.history(HistoryKind::Sql).is_empty());

        reopened
            .clear_history(HistoryKind::Ssh)
            .expect("clear should persist");
        let (cleared, _) = Store::open(temp_dir.path());
        assert!(cleared.history(HistoryKind::Ssh).is_empty());
    }

    #[test]
    fn concurrent_writers_do_not_lose_increments() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let (store, _) = Store::open(temp_dir.path());
        let store = Arc::new(store);

        let workers = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        store
                            .increment(StatKey::CmdScriptCount)
                            .expect("increment should persist");
                    }
                })
            })
            .collect::<Vec<_>>();
        for worker in workers {
            worker.join().expect("worker should not panic");
        }

        let (reopened, _) = Store::open(temp_dir.path());
        assert_eq!(reopened.stat(StatKey::CmdScriptCount), 40);
    }

    #[test]
    fn failed_write_keeps_memory_in_step_with_disk() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let store_dir = temp_dir.path().join("opsdesk");
        let (store, _) = Store::open(&store_dir);
        store
            .add_history(HistoryKind::Sql, "SELECT 1")
            .expect("history add should persist");

        fs::remove_dir_all(&store_dir).expect("failed to remove store dir");
        fs::write(&store_dir, "not a directory").expect("failed to block store dir");

        assert!(store.increment(StatKey::DbSelectCount).is_err());
        assert_eq!(store.stat(StatKey::DbSelectCount), 0);
        assert!(store.add_history(HistoryKind::Sql, "SELECT 2").is_err());
        assert!(store.clear_history(HistoryKind::Sql).is_err());
        assert_eq!(store.history(HistoryKind::Sql).commands(), ["SELECT 1"]);
        assert!(store.set_setting(SettingKey::FontSize, 18).is_err());
        assert_eq!(store.setting(SettingKey::FontSize), json!(14));
    }
}
