//! Postgres protocol constants

/// Protocol version 3.0
pub const PROTOCOL_VERSION: i32 = 0x0003_0000;

/// SSLRequest code (80877103 = 1234 << 16 | 5679)
pub const SSL_REQUEST_CODE: i32 = 0x04D2_162F;

/// Maximum accepted message length (1 GiB), matching PostgreSQL's own
/// `PQ_LARGE_MESSAGE_LIMIT`. Length fields above this are rejected before
/// any allocation happens.
pub const MAX_MESSAGE_LENGTH: usize = 1_073_741_824;

/// Backend message type tags
pub mod tags {
    /// Authentication request
    pub const AUTHENTICATION: u8 = b'R';

    /// Backend key data
    pub const BACKEND_KEY_DATA: u8 = b'K';

    /// Bind complete
    pub const BIND_COMPLETE: u8 = b'2';

    /// Close complete
    pub const CLOSE_COMPLETE: u8 = b'3';

    /// Command complete
    pub const COMMAND_COMPLETE: u8 = b'C';

    /// Data row
    pub const DATA_ROW: u8 = b'D';

    /// Empty query response
    pub const EMPTY_QUERY_RESPONSE: u8 = b'I';

    /// Error response
    pub const ERROR_RESPONSE: u8 = b'E';

    /// No data (statement returns no rows)
    pub const NO_DATA: u8 = b'n';

    /// Notice response
    pub const NOTICE_RESPONSE: u8 = b'N';

    /// Parameter description
    pub const PARAMETER_DESCRIPTION: u8 = b't';

    /// Parameter status
    pub const PARAMETER_STATUS: u8 = b'S';

    /// Parse complete
    pub const PARSE_COMPLETE: u8 = b'1';

    /// Portal suspended (row limit hit)
    pub const PORTAL_SUSPENDED: u8 = b's';

    /// Ready for query
    pub const READY_FOR_QUERY: u8 = b'Z';

    /// Row description
    pub const ROW_DESCRIPTION: u8 = b'T';
}

/// Frontend message type tags
pub mod frontend_tags {
    /// Bind
    pub const BIND: u8 = b'B';

    /// Describe
    pub const DESCRIBE: u8 = b'D';

    /// Execute
    pub const EXECUTE: u8 = b'E';

    /// Parse
    pub const PARSE: u8 = b'P';

    /// Password / SASL response
    pub const PASSWORD: u8 = b'p';

    /// Simple query
    pub const QUERY: u8 = b'Q';

    /// Sync
    pub const SYNC: u8 = b'S';

    /// Terminate
    pub const TERMINATE: u8 = b'X';
}

/// Authentication sub-codes
pub mod auth {
    /// Authentication successful
    pub const OK: i32 = 0;

    /// Kerberos V5 (not supported)
    pub const KERBEROS_V5: i32 = 2;

    /// Cleartext password required
    pub const CLEARTEXT_PASSWORD: i32 = 3;

    /// MD5 password required (not supported)
    pub const MD5_PASSWORD: i32 = 5;

    /// SCM credentials (not supported)
    pub const SCM_CREDENTIAL: i32 = 6;

    /// GSSAPI (not supported)
    pub const GSS: i32 = 7;

    /// SSPI (not supported)
    pub const SSPI: i32 = 9;

    /// SASL mechanisms available (Postgres 10+)
    pub const SASL: i32 = 10;

    /// SASL server challenge
    pub const SASL_CONTINUE: i32 = 11;

    /// SASL server final message
    pub const SASL_FINAL: i32 = 12;
}

/// Transaction status carried by ReadyForQuery
pub mod tx_status {
    /// Idle (not in transaction)
    pub const IDLE: u8 = b'I';

    /// In transaction block
    pub const IN_TRANSACTION: u8 = b'T';

    /// Failed transaction (queries will be rejected until END)
    pub const FAILED: u8 = b'E';
}

/// Wire format codes for parameters and result columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum Format {
    /// Text representation
    Text = 0,
    /// Binary representation
    Binary = 1,
}
