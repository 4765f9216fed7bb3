use std::fmt;

use crate::execution::ValidationError;

pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Per-session connection parameters. Never persisted; the secret is kept
/// out of `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    secret: String,
    pub database: Option<String>,
}

impl ConnectionParams {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            secret: String::new(),
            database: None,
        }
    }

    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        let database = database.into();
        self.database = (!database.trim().is_empty()).then_some(database);
        self
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// `user@host:port`, used in logs and messages.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingField("host"));
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.username.trim().is_empty() {
            return Err(ValidationError::MissingField("username"));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &if self.secret.is_empty() { "" } else { "***" })
            .field("database", &self.database)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionParams;
    use crate::execution::ValidationError;

    #[test]
    fn validation_requires_host_port_and_username() {
        assert_eq!(
            ConnectionParams::new(" ", 3306, "root").validate(),
            Err(ValidationError::MissingField("host"))
        );
        assert_eq!(
            ConnectionParams::new("db", 0, "root").validate(),
            Err(ValidationError::InvalidPort)
        );
        assert_eq!(
            ConnectionParams::new("db", 3306, "").validate(),
            Err(ValidationError::MissingField("username"))
        );
        assert!(ConnectionParams::new("db", 3306, "root").validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let params = ConnectionParams::new("db", 3306, "root").with_secret("hunter2");
        let rendered = format!("{params:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
        assert_eq!(params.secret(), "hunter2");
    }

    #[test]
    fn blank_database_is_treated_as_absent() {
        let params = ConnectionParams::new("db", 3306, "root").with_database("  ");
        assert!(params.database.is_none());
        assert_eq!(params.target(), "root@db:3306");
    }
}
