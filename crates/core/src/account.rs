use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::json_document::{load_or_default, write_atomic, DocumentError, LoadStatus};

pub const ACCOUNT_FILE_NAME: &str = "account.json";
pub const DEFAULT_USERNAME: &str = "admin";
const DEFAULT_PASSWORD: &str = "admin123";

/// Checks a username/password pair. Nothing else about the account is
/// exposed to callers.
pub trait Authenticator: Send + Sync {
    fn login(&self, username: &str, password: &str) -> bool;
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("username or password is incorrect")]
    InvalidCredentials,
    #[error("new password must not be empty")]
    EmptyPassword,
    #[error(transparent)]
    Document(#[from] DocumentError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AccountRecord {
    username: String,
    password_sha256: String,
}

impl Default for AccountRecord {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            password_sha256: password_digest(DEFAULT_PASSWORD),
        }
    }
}

fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// The single administrator account, stored as `account.json` next to the
/// other documents. Only a SHA-256 digest of the password is kept.
#[derive(Debug)]
pub struct FileAccountStore {
    path: PathBuf,
    record: Mutex<AccountRecord>,
}

impl FileAccountStore {
    /// Loads the account from `dir`, falling back to the default credentials
    /// (and rewriting the file) when it is missing or unreadable.
    pub fn open(dir: &Path) -> (Self, LoadStatus) {
        let path = dir.join(ACCOUNT_FILE_NAME);
        let (record, status) = load_or_default(&path, AccountRecord::default);
        if let LoadStatus::Reset { reason } = &status {
            warn!(path = %path.display(), %reason, "account file was reset to defaults");
        }
        if status.needs_persist() {
            if let Err(error) = write_atomic(&path, &record) {
                warn!(path = %path.display(), %error, "failed to persist account file");
            }
        }
        (
            Self {
                path,
                record: Mutex::new(record),
            },
            status,
        )
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn username(&self) -> String {
        self.record.lock().username.clone()
    }

    pub fn change_password(
        &self,
        username: &str,
        current: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        if new_password.is_empty() {
            return Err(AccountError::EmptyPassword);
        }
        let mut record = self.record.lock();
        if !credentials_match(&record, username, current) {
            return Err(AccountError::InvalidCredentials);
        }

        let mut updated = record.clone();
        updated.password_sha256 = password_digest(new_password);
        write_atomic(&self.path, &updated)?;
        *record = updated;
        info!(username, "account password changed");
        Ok(())
    }
}

fn credentials_match(record: &AccountRecord, username: &str, password: &str) -> bool {
    record.username == username && record.password_sha256 == password_digest(password)
}

impl Authenticator for FileAccountStore {
    fn login(&self, username: &str, password: &str) -> bool {
        let accepted = credentials_match(&self.record.lock(), username, password);
        if !accepted {
            warn!(username, "login rejected");
        }
        accepted
    }
}
