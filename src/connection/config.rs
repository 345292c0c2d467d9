//! Connection configuration

use super::tls::TlsMode;
use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

/// Connection configuration
///
/// Stores server address, credentials, TLS settings, and the pool's
/// default acquisition timeout. Built with [`Config::builder`]; the
/// builder validates on `build()`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname or IP literal
    pub host: String,
    /// Server port (default 5432)
    pub port: u16,
    /// Username (also the default database name)
    pub username: String,
    /// Database name; `None` falls back to the username
    pub database: Option<String>,
    /// Password (required for SCRAM and cleartext authentication)
    pub password: Option<String>,
    /// TLS negotiation mode (default: prefer)
    pub tls_mode: TlsMode,
    /// Custom CA certificate file (PEM); `None` uses system roots
    pub tls_ca_file: Option<PathBuf>,
    /// Client certificate file (PEM) for mutual TLS
    pub tls_client_cert: Option<PathBuf>,
    /// Client private key file (PEM); required with `tls_client_cert`
    pub tls_client_key: Option<PathBuf>,
    /// Pool acquisition timeout (default 10 s); zero waits forever
    pub acquire_timeout: Duration,
    /// Application name reported to the server
    pub application_name: Option<String>,
}

impl Config {
    /// Create a builder for the given host and username
    pub fn builder(host: impl Into<String>, username: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            host: host.into(),
            port: 5432,
            username: username.into(),
            database: None,
            password: None,
            tls_mode: TlsMode::default(),
            tls_ca_file: None,
            tls_client_cert: None,
            tls_client_key: None,
            acquire_timeout: Duration::from_millis(10_000),
            application_name: None,
        }
    }

    /// Effective database name: configured, or the username
    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(&self.username)
    }

    /// Validate required fields and cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.username.is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.tls_client_cert.is_some() && self.tls_client_key.is_none() {
            return Err(ConfigError::ClientCertNeedsKey);
        }
        Ok(())
    }
}

/// Builder for [`Config`]
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: u16,
    username: String,
    database: Option<String>,
    password: Option<String>,
    tls_mode: TlsMode,
    tls_ca_file: Option<PathBuf>,
    tls_client_cert: Option<PathBuf>,
    tls_client_key: Option<PathBuf>,
    acquire_timeout: Duration,
    application_name: Option<String>,
}

impl ConfigBuilder {
    /// Set the server port
    ///
    /// Default: 5432
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database name
    ///
    /// Default: same as the username
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the TLS negotiation mode
    ///
    /// Default: [`TlsMode::Prefer`]
    pub fn tls_mode(mut self, mode: TlsMode) -> Self {
        self.tls_mode = mode;
        self
    }

    /// Use a custom CA certificate file instead of system roots
    pub fn tls_ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_ca_file = Some(path.into());
        self
    }

    /// Present a client certificate during the TLS handshake
    ///
    /// A key set via [`ConfigBuilder::tls_client_key`] must accompany it.
    pub fn tls_client_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_client_cert = Some(path.into());
        self
    }

    /// Private key for the client certificate
    pub fn tls_client_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_client_key = Some(path.into());
        self
    }

    /// Set the pool acquisition timeout in milliseconds
    ///
    /// Default: 10 000 ms. Zero waits without a deadline.
    pub fn acquire_timeout_ms(mut self, millis: u64) -> Self {
        self.acquire_timeout = Duration::from_millis(millis);
        self
    }

    /// Set the application name reported in Postgres logs
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<Config, ConfigError> {
        let config = Config {
            host: self.host,
            port: self.port,
            username: self.username,
            database: self.database,
            password: self.password,
            tls_mode: self.tls_mode,
            tls_ca_file: self.tls_ca_file,
            tls_client_cert: self.tls_client_cert,
            tls_client_key: self.tls_client_key,
            acquire_timeout: self.acquire_timeout,
            application_name: self.application_name,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::builder("localhost", "alice").build().unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.username, "alice");
        assert_eq!(config.database(), "alice");
        assert_eq!(config.tls_mode, TlsMode::Prefer);
        assert_eq!(config.acquire_timeout, Duration::from_millis(10_000));
        assert!(config.password.is_none());
        assert!(config.application_name.is_none());
    }

    #[test]
    fn test_config_builder_fluent() {
        let config = Config::builder("db.internal", "svc")
            .port(5433)
            .database("orders")
            .password("secret")
            .tls_mode(TlsMode::Require)
            .acquire_timeout_ms(250)
            .application_name("worker")
            .build()
            .unwrap();

        assert_eq!(config.port, 5433);
        assert_eq!(config.database(), "orders");
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.tls_mode, TlsMode::Require);
        assert_eq!(config.acquire_timeout, Duration::from_millis(250));
        assert_eq!(config.application_name.as_deref(), Some("worker"));
    }

    #[test]
    fn test_empty_host_rejected() {
        let err = Config::builder("", "alice").build().unwrap_err();
        assert_eq!(err, ConfigError::EmptyHost);
    }

    #[test]
    fn test_empty_username_rejected() {
        let err = Config::builder("localhost", "").build().unwrap_err();
        assert_eq!(err, ConfigError::EmptyUsername);
    }

    #[test]
    fn test_zero_port_rejected() {
        let err = Config::builder("localhost", "alice")
            .port(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidPort);
    }

    #[test]
    fn test_client_cert_requires_key() {
        let err = Config::builder("localhost", "alice")
            .tls_client_cert("/certs/client.pem")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ClientCertNeedsKey);

        let ok = Config::builder("localhost", "alice")
            .tls_client_cert("/certs/client.pem")
            .tls_client_key("/certs/client.key")
            .build();
        assert!(ok.is_ok());
    }
}
