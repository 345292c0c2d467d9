//! Protocol message types

use crate::error::{ServerError, Severity};
use crate::query::Param;
use bytes::Bytes;

/// Frontend message (client → server)
#[derive(Debug, Clone)]
pub enum FrontendMessage {
    /// Startup message
    Startup {
        /// Protocol version
        version: i32,
        /// Connection parameters
        params: Vec<(String, String)>,
    },

    /// Password message (cleartext authentication)
    Password(String),

    /// Simple query message
    Query(String),

    /// Parse message (create a prepared statement)
    Parse {
        /// Statement name ("" for the unnamed statement)
        name: String,
        /// SQL text
        sql: String,
    },

    /// Bind message (bind parameters to a prepared statement)
    Bind {
        /// Portal name ("" for the unnamed portal)
        portal: String,
        /// Statement name
        statement: String,
        /// Parameter values
        params: Vec<Param>,
    },

    /// Describe message
    Describe {
        /// b'S' for statement, b'P' for portal
        kind: u8,
        /// Statement or portal name
        name: String,
    },

    /// Execute message
    Execute {
        /// Portal name
        portal: String,
        /// Maximum rows to return (0 = unlimited)
        max_rows: i32,
    },

    /// Sync message (end of an extended-protocol request)
    Sync,

    /// Terminate message
    Terminate,

    /// SASL initial response message
    SaslInitialResponse {
        /// SASL mechanism name (e.g., "SCRAM-SHA-256")
        mechanism: String,
        /// SASL client first message data
        data: Vec<u8>,
    },

    /// SASL response message
    SaslResponse {
        /// SASL client final message data
        data: Vec<u8>,
    },

    /// SSLRequest message (TLS negotiation)
    SslRequest,
}

/// Backend message (server → client)
#[derive(Debug, Clone)]
pub enum BackendMessage {
    /// Authentication request
    Authentication(AuthenticationMessage),

    /// Backend key data (for cancellation)
    BackendKeyData {
        /// Process ID
        process_id: i32,
        /// Secret key
        secret_key: i32,
    },

    /// Bind complete
    BindComplete,

    /// Close complete
    CloseComplete,

    /// Command complete
    CommandComplete(String),

    /// Data row
    DataRow(Vec<Option<Bytes>>),

    /// Empty query response (the SQL string was empty)
    EmptyQueryResponse,

    /// Error response
    ErrorResponse(ErrorFields),

    /// No data (statement produces no rows)
    NoData,

    /// Notice response
    NoticeResponse(ErrorFields),

    /// Parameter description
    ParameterDescription {
        /// Parameter type OIDs
        type_oids: Vec<u32>,
    },

    /// Parameter status
    ParameterStatus {
        /// Parameter name
        name: String,
        /// Parameter value
        value: String,
    },

    /// Parse complete
    ParseComplete,

    /// Portal suspended (row limit hit)
    PortalSuspended,

    /// Ready for query
    ReadyForQuery {
        /// Transaction status
        status: u8,
    },

    /// Row description
    RowDescription(Vec<FieldDescription>),
}

/// Authentication message types
#[derive(Debug, Clone)]
pub enum AuthenticationMessage {
    /// Authentication OK
    Ok,

    /// Cleartext password required
    CleartextPassword,

    /// MD5 password required (unsupported)
    Md5Password {
        /// Salt for MD5 hash
        salt: [u8; 4],
    },

    /// Some other unsupported mechanism (Kerberos, GSSAPI, SSPI, SCM)
    Unsupported {
        /// Authentication sub-code
        code: i32,
    },

    /// SASL authentication mechanisms available (Postgres 10+)
    Sasl {
        /// List of SASL mechanism names (e.g., ["SCRAM-SHA-256"])
        mechanisms: Vec<String>,
    },

    /// SASL continuation message (server challenge)
    SaslContinue {
        /// SASL server first/continue message data
        data: Vec<u8>,
    },

    /// SASL final message (server verification)
    SaslFinal {
        /// SASL server final message data
        data: Vec<u8>,
    },
}

/// Field description (column metadata)
#[derive(Debug, Clone)]
pub struct FieldDescription {
    /// Column name
    pub name: String,
    /// Table OID (0 if not a table column)
    pub table_oid: i32,
    /// Column attribute number (0 if not a table column)
    pub column_attr: i16,
    /// Data type OID
    pub type_oid: u32,
    /// Data type size
    pub type_size: i16,
    /// Type modifier
    pub type_modifier: i32,
    /// Format code (0 = text, 1 = binary)
    pub format_code: i16,
}

/// Error/notice fields
#[derive(Debug, Clone, Default)]
pub struct ErrorFields {
    /// Severity (ERROR, WARNING, etc.)
    pub severity: Option<String>,
    /// SQLSTATE code
    pub code: Option<String>,
    /// Human-readable message
    pub message: Option<String>,
    /// Additional detail
    pub detail: Option<String>,
    /// Hint
    pub hint: Option<String>,
    /// Position in query string
    pub position: Option<String>,
}

impl ErrorFields {
    /// Convert an ErrorResponse into a typed server error
    pub fn into_server_error(self) -> ServerError {
        ServerError {
            severity: Severity::parse(self.severity.as_deref().unwrap_or("ERROR")),
            code: self.code.unwrap_or_default(),
            message: self.message.unwrap_or_default(),
            detail: self.detail,
            hint: self.hint,
        }
    }
}

impl std::fmt::Display for ErrorFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref msg) = self.message {
            write!(f, "{}", msg)?;
        }
        if let Some(ref code) = self.code {
            write!(f, " ({})", code)?;
        }
        Ok(())
    }
}
