use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;

fn default_port() -> u16 {
    3306
}

fn default_max_connections() -> u32 {
    4
}

/// Connection settings handed to [`crate::db::MySqlFetcher::connect`].
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    pub database: String,
    /// Upper bound on concurrent fetches.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        password: Option<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: user.into(),
            password,
            database: database.into(),
            max_connections: default_max_connections(),
        }
    }

    /// Replaces the configured password, e.g. with one taken from the environment.
    pub fn with_password_override(mut self, password: Option<String>) -> Self {
        if password.is_some() {
            self.password = password;
        }
        self
    }

    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut opts = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database)
            .charset("utf8mb4");

        if let Some(password) = &self.password {
            opts = opts.password(password);
        }

        opts
    }
}

// Keep the password out of logs
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_defaults() {
        let config: DatabaseConfig =
            serde_yaml::from_str("host: db.local\nuser: report\ndatabase: market\n").unwrap();
        assert_eq!(config.port, 3306);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.password, None);
    }

    #[test]
    fn password_override_only_when_present() {
        let config = DatabaseConfig::new("h", "u", Some("file".into()), "d");
        assert_eq!(
            config.clone().with_password_override(None).password.as_deref(),
            Some("file")
        );
        assert_eq!(
            config.with_password_override(Some("env".into())).password.as_deref(),
            Some("env")
        );
    }

    #[test]
    fn debug_hides_password() {
        let config = DatabaseConfig::new("h", "u", Some("secret".into()), "d");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("***"));
    }
}
