//! Connection management
//!
//! This module handles:
//! * Configuration and validation
//! * Transport abstraction (plain TCP vs TLS)
//! * Connection lifecycle (startup, auth, teardown)
//! * State machine enforcement
//! * TLS configuration and support

mod config;
mod conn;
mod state;
mod tls;
mod transport;

pub use config::{Config, ConfigBuilder};
pub use conn::Connection;
pub use state::ConnectionState;
pub use tls::{parse_server_name, TlsConfig, TlsMode};
pub use transport::Transport;
