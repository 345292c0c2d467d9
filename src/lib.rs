//! # pgcord
//!
//! A native client for the PostgreSQL frontend/backend wire protocol
//! (version 3.0) built on blocking I/O:
//!
//! * Simple Query and Extended Query (Parse/Bind/Describe/Execute/Sync)
//!   protocols over plain TCP or TLS
//! * SCRAM-SHA-256 and cleartext password authentication
//! * Row deserialization into user-defined record types via the
//!   [`FromRow`]/[`FromSql`] traits
//! * A fixed-size, thread-safe connection pool with health checking,
//!   per-acquisition session reset, and row-level-security session
//!   variables
//!
//! ```no_run
//! use pgcord::{Config, FromRow, Pool, QueryResult, Row, TlsMode};
//!
//! struct Count {
//!     n: i32,
//! }
//!
//! impl FromRow for Count {
//!     const COLUMNS: usize = 1;
//!     fn from_row(row: &mut Row) -> Result<Self, pgcord::DecodeError> {
//!         Ok(Count { n: row.take()? })
//!     }
//! }
//!
//! fn main() -> pgcord::Result<()> {
//!     let config = Config::builder("localhost", "app")
//!         .password("secret")
//!         .tls_mode(TlsMode::Disable)
//!         .build()?;
//!     let pool = Pool::new(config, 4)?;
//!
//!     let mut conn = pool.get()?;
//!     match conn.simple().run::<Count>("SELECT 1")? {
//!         QueryResult::Rows(rows) => assert_eq!(rows[0].n, 1),
//!         _ => unreachable!(),
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod connection;
pub mod error;
pub(crate) mod metrics;
pub mod pool;
pub mod protocol;
pub mod query;
pub mod row;

pub use connection::{Config, ConfigBuilder, Connection, ConnectionState, TlsConfig, TlsMode};
pub use error::{
    ConfigError, DecodeError, Error, PoolError, Result, ServerError, Severity,
};
pub use pool::{Pool, PooledConnection, RlsContext};
pub use query::{ExplainRow, ExtendedQuery, Param, QueryResult, SimpleQuery, Verb};
pub use row::{FixedChar, FromRow, FromSql, Row};
