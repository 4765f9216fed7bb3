use std::env;
use std::path::PathBuf;

use thiserror::Error;

pub const CONFIG_DIR_ENV: &str = "OPSDESK_CONFIG_DIR";

#[derive(Debug, Error)]
pub enum PathsError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
}

/// Resolves the directory holding every persisted opsdesk document.
///
/// `OPSDESK_CONFIG_DIR` wins when set and is used as-is; otherwise the
/// platform config root gets an `opsdesk` subdirectory.
pub fn default_config_dir() -> Result<PathBuf, PathsError> {
    if let Some(custom) = env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(custom));
    }

    let base_dir = if cfg!(target_os = "windows") {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or(PathsError::ConfigDirUnavailable)?
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        let home = env::var_os("HOME").ok_or(PathsError::ConfigDirUnavailable)?;
        PathBuf::from(home).join(".config")
    };

    Ok(base_dir.join("opsdesk"))
}

#[must_use]
pub fn log_dir(config_dir: &std::path::Path) -> PathBuf {
    config_dir.join("log")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::log_dir;

    #[test]
    fn log_dir_lives_under_config_dir() {
        assert_eq!(
            log_dir(Path::new("/tmp/opsdesk")),
            Path::new("/tmp/opsdesk/log")
        );
    }
}
