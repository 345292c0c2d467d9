//! TLS configuration and support for secure connections to Postgres.
//!
//! TLS is negotiated with the SSLRequest protocol: the connection starts
//! as plain TCP, asks the server whether it speaks TLS, and upgrades when
//! it does. TLS is recommended for all non-local connections to prevent
//! credential interception.

use crate::connection::Config;
use crate::{Error, Result};
use rustls::{ClientConfig, RootCertStore};
use rustls_pemfile::Item;
use std::fs;
use std::sync::Arc;

/// TLS negotiation mode, matching the `sslmode` levels the original
/// configuration surface exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TlsMode {
    /// Never request TLS (plaintext connection)
    Disable,
    /// Request TLS; fall back to plaintext if the server declines
    #[default]
    Prefer,
    /// Request TLS; fail if the server declines
    Require,
}

impl std::fmt::Display for TlsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disable => write!(f, "disable"),
            Self::Prefer => write!(f, "prefer"),
            Self::Require => write!(f, "require"),
        }
    }
}

impl std::str::FromStr for TlsMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "disable" => Ok(Self::Disable),
            "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            _ => Err(Error::Tls(format!(
                "invalid tls_mode '{}': expected disable, prefer, or require",
                s
            ))),
        }
    }
}

/// Compiled TLS configuration for a connection.
///
/// Wraps a `rustls::ClientConfig` assembled from the connection
/// configuration: a custom CA file when one is given, otherwise system
/// roots with the bundled webpki roots as fallback, plus an optional
/// client certificate for mutual TLS.
#[derive(Clone)]
pub struct TlsConfig {
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Build the TLS configuration from connection settings.
    ///
    /// # Errors
    ///
    /// Fails when certificate files cannot be read or parsed, or when no
    /// trust root can be established.
    pub fn from_config(config: &Config) -> Result<Self> {
        let root_store = match &config.tls_ca_file {
            Some(ca_path) => load_custom_ca(&ca_path.to_string_lossy())?,
            None => {
                let result = rustls_native_certs::load_native_certs();

                let mut store = RootCertStore::empty();
                for cert in result.certs {
                    let _ = store.add_parsable_certificates(std::iter::once(cert));
                }

                // Fall back to the bundled webpki roots when the platform
                // store yields nothing
                if store.is_empty() {
                    if !result.errors.is_empty() {
                        tracing::warn!(
                            "system root certificates unavailable, using bundled roots"
                        );
                    }
                    store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                }

                store
            }
        };

        let builder = ClientConfig::builder().with_root_certificates(root_store);

        let client_config = match (&config.tls_client_cert, &config.tls_client_key) {
            (Some(cert_path), Some(key_path)) => {
                let certs = load_client_certs(&cert_path.to_string_lossy())?;
                let key = load_client_key(&key_path.to_string_lossy())?;
                builder
                    .with_client_auth_cert(certs, key)
                    .map_err(|e| Error::Tls(format!("invalid client certificate: {}", e)))?
            }
            _ => builder.with_no_client_auth(),
        };

        Ok(TlsConfig {
            client_config: Arc::new(client_config),
        })
    }

    /// Get the rustls ClientConfig for this TLS configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Load a custom CA certificate from a PEM file.
fn load_custom_ca(ca_path: &str) -> Result<RootCertStore> {
    let ca_cert_data = fs::read(ca_path).map_err(|e| {
        Error::Tls(format!(
            "failed to read CA certificate file '{}': {}",
            ca_path, e
        ))
    })?;

    let mut reader = std::io::Cursor::new(&ca_cert_data);
    let mut root_store = RootCertStore::empty();
    let mut found_certs = 0;

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(Item::X509Certificate(cert))) => {
                let _ = root_store.add_parsable_certificates(std::iter::once(cert));
                found_certs += 1;
            }
            Ok(Some(_)) => {
                // Skip non-certificate items (private keys, etc.)
            }
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Tls(format!(
                    "failed to parse CA certificate from '{}'",
                    ca_path
                )));
            }
        }
    }

    if found_certs == 0 {
        return Err(Error::Tls(format!(
            "no valid certificates found in '{}'",
            ca_path
        )));
    }

    Ok(root_store)
}

fn load_client_certs(
    path: &str,
) -> Result<Vec<rustls_pki_types::CertificateDer<'static>>> {
    let data = fs::read(path)
        .map_err(|e| Error::Tls(format!("failed to read client certificate '{}': {}", path, e)))?;
    let mut reader = std::io::Cursor::new(&data);
    let certs: std::result::Result<Vec<_>, _> = rustls_pemfile::certs(&mut reader).collect();
    let certs = certs
        .map_err(|e| Error::Tls(format!("failed to parse client certificate '{}': {}", path, e)))?;
    if certs.is_empty() {
        return Err(Error::Tls(format!(
            "no certificates found in '{}'",
            path
        )));
    }
    Ok(certs)
}

fn load_client_key(path: &str) -> Result<rustls_pki_types::PrivateKeyDer<'static>> {
    let data = fs::read(path)
        .map_err(|e| Error::Tls(format!("failed to read client key '{}': {}", path, e)))?;
    let mut reader = std::io::Cursor::new(&data);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::Tls(format!("failed to parse client key '{}': {}", path, e)))?
        .ok_or_else(|| Error::Tls(format!("no private key found in '{}'", path)))
}

/// Parse server name from hostname for TLS SNI (Server Name Indication).
///
/// # Errors
///
/// Returns an error if the hostname is empty, too long, or contains
/// characters that cannot appear in a DNS name or IP literal.
pub fn parse_server_name(hostname: &str) -> Result<String> {
    // Remove trailing dot if present
    let hostname = hostname.trim_end_matches('.');

    if hostname.is_empty() || hostname.len() > 253 {
        return Err(Error::Tls(format!(
            "invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    if !hostname
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '.' || c == ':')
    {
        return Err(Error::Tls(format!(
            "invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    Ok(hostname.to_string())
}
