use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Theme,
    FontSize,
    Brightness,
    SqlTimeout,
    SshTimeout,
    LogLevel,
    AutoStart,
    RememberLogin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Text,
    PositiveInteger,
    Integer,
    Flag,
}

impl SettingKey {
    pub const ALL: [Self; 8] = [
        Self::Theme,
        Self::FontSize,
        Self::Brightness,
        Self::SqlTimeout,
        Self::SshTimeout,
        Self::LogLevel,
        Self::AutoStart,
        Self::RememberLogin,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Theme => "theme",
            Self::FontSize => "font_size",
            Self::Brightness => "brightness",
            Self::SqlTimeout => "sql_timeout",
            Self::SshTimeout => "ssh_timeout",
            Self::LogLevel => "log_level",
            Self::AutoStart => "auto_start",
            Self::RememberLogin => "remember_login",
        }
    }

    #[must_use]
    pub fn kind(self) -> SettingKind {
        match self {
            Self::Theme | Self::LogLevel => SettingKind::Text,
            Self::FontSize | Self::SqlTimeout | Self::SshTimeout => SettingKind::PositiveInteger,
            Self::Brightness => SettingKind::Integer,
            Self::AutoStart | Self::RememberLogin => SettingKind::Flag,
        }
    }

    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            Self::Theme => Value::from("light"),
            Self::FontSize => Value::from(14),
            Self::Brightness => Value::from(10),
            Self::SqlTimeout => Value::from(30),
            Self::SshTimeout => Value::from(10),
            Self::LogLevel => Value::from("INFO"),
            Self::AutoStart | Self::RememberLogin => Value::Bool(false),
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self.kind() {
            SettingKind::Text => value.is_string(),
            SettingKind::PositiveInteger => value.as_u64().is_some_and(|number| number > 0),
            SettingKind::Integer => value.is_i64() || value.is_u64(),
            SettingKind::Flag => value.is_boolean(),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown setting `{0}`")]
pub struct UnknownSetting(pub String);

impl FromStr for SettingKey {
    type Err = UnknownSetting;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == raw)
            .ok_or_else(|| UnknownSetting(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("setting `{key}` expects {expected}, got `{value}`")]
    InvalidValue {
        key: SettingKey,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }

    fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARNING" | "WARN" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Flat key/value settings document.
///
/// Known keys always resolve: a missing or mistyped value reads as the key's
/// default. Keys this build does not know about are kept verbatim so a
/// rewrite never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppSettings {
    values: Map<String, Value>,
}

impl Default for AppSettings {
    fn default() -> Self {
        let values = SettingKey::ALL
            .into_iter()
            .map(|key| (key.as_str().to_string(), key.default_value()))
            .collect();
        Self { values }
    }
}

impl AppSettings {
    #[must_use]
    pub fn get(&self, key: SettingKey) -> Value {
        self.values
            .get(key.as_str())
            .filter(|value| key.accepts(value))
            .cloned()
            .unwrap_or_else(|| key.default_value())
    }

    /// Looks a setting up by name; unknown names only resolve if the document
    /// happens to carry them.
    #[must_use]
    pub fn get_named(&self, name: &str) -> Option<Value> {
        match name.parse::<SettingKey>() {
            Ok(key) => Some(self.get(key)),
            Err(_) => self.values.get(name).cloned(),
        }
    }

    pub fn set(&mut self, key: SettingKey, value: impl Into<Value>) -> Result<(), SettingsError> {
        let value = value.into();
        if !key.accepts(&value) {
            return Err(SettingsError::InvalidValue {
                key,
                expected: match key.kind() {
                    SettingKind::Text => "a string",
                    SettingKind::PositiveInteger => "a positive integer",
                    SettingKind::Integer => "an integer",
                    SettingKind::Flag => "true or false",
                },
                value: value.to_string(),
            });
        }
        self.values.insert(key.as_str().to_string(), value);
        Ok(())
    }

    /// Every known key with its effective value, in declaration order.
    #[must_use]
    pub fn entries(&self) -> Vec<(SettingKey, Value)> {
        SettingKey::ALL
            .into_iter()
            .map(|key| (key, self.get(key)))
            .collect()
    }

    #[must_use]
    pub fn theme(&self) -> String {
        self.text(SettingKey::Theme)
    }

    #[must_use]
    pub fn font_size(&self) -> u64 {
        self.positive(SettingKey::FontSize)
    }

    #[must_use]
    pub fn sql_timeout(&self) -> Duration {
        Duration::from_secs(self.positive(SettingKey::SqlTimeout))
    }

    #[must_use]
    pub fn ssh_timeout(&self) -> Duration {
        Duration::from_secs(self.positive(SettingKey::SshTimeout))
    }

    #[must_use]
    pub fn log_level(&self) -> LogLevel {
        LogLevel::parse_lenient(&self.text(SettingKey::LogLevel)).unwrap_or_default()
    }

    #[must_use]
    pub fn auto_start(&self) -> bool {
        self.get(SettingKey::AutoStart).as_bool().unwrap_or(false)
    }

    #[must_use]
    pub fn remember_login(&self) -> bool {
        self.get(SettingKey::RememberLogin)
            .as_bool()
            .unwrap_or(false)
    }

    fn text(&self, key: SettingKey) -> String {
        match self.get(key) {
            Value::String(text) => text,
            other => other.to_string(),
        }
    }

    fn positive(&self, key: SettingKey) -> u64 {
        self.get(key).as_u64().unwrap_or_default()
    }
}
