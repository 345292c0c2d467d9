//! Core connection type

use super::state::ConnectionState;
use super::tls::{TlsConfig, TlsMode};
use super::transport::Transport;
use super::Config;
use crate::auth::{ScramClient, ScramError};
use crate::protocol::{
    decode_message, encode_message, encode_message_into, AuthenticationMessage, BackendMessage,
    FrontendMessage,
};
use crate::query::{ExtendedQuery, SimpleQuery, Verb};
use crate::{Error, Result};
use bytes::{Buf, BytesMut};
use std::collections::HashMap;

/// Per-session state, present only while a socket exists.
///
/// Groups everything that is born with the startup handshake and dies
/// with the socket: the transport, the receive buffer, the prepared
/// statement registry, and the backend key data.
#[derive(Debug)]
pub(crate) struct Session {
    transport: Transport,
    read_buf: BytesMut,
    statements: HashMap<String, Verb>,
    process_id: Option<i32>,
    secret_key: Option<i32>,
}

impl Session {
    fn new(transport: Transport, read_buf: BytesMut) -> Self {
        Self {
            transport,
            read_buf,
            statements: HashMap::new(),
            process_id: None,
            secret_key: None,
        }
    }
}

/// A single Postgres connection.
///
/// One connection is a single-threaded resource: at most one thread may
/// be issuing or receiving messages on it at any instant. The
/// [`crate::Pool`] is the synchronization boundary that enforces this.
#[derive(Debug)]
pub struct Connection {
    config: Config,
    state: ConnectionState,
    session: Option<Session>,
}

impl Connection {
    /// Create a disconnected connection holding a configuration snapshot
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            session: None,
        }
    }

    /// Create a connection and immediately connect it
    pub fn connect_with(config: Config) -> Result<Self> {
        let mut conn = Self::new(config);
        conn.connect()?;
        Ok(conn)
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the connection is usable (server at ReadyForQuery)
    pub fn is_alive(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Configuration snapshot this connection was created with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Backend process id reported during startup, if any
    pub fn backend_pid(&self) -> Option<i32> {
        self.session.as_ref().and_then(|s| s.process_id)
    }

    /// Backend secret key reported during startup, if any
    pub fn backend_secret(&self) -> Option<i32> {
        self.session.as_ref().and_then(|s| s.secret_key)
    }

    /// Simple (text) query facade over this connection
    pub fn simple(&mut self) -> SimpleQuery<'_> {
        SimpleQuery::new(self)
    }

    /// Extended (Parse/Bind/Execute) query facade over this connection
    pub fn extended(&mut self) -> ExtendedQuery<'_> {
        ExtendedQuery::new(self)
    }

    /// Open the socket, negotiate TLS, run the startup handshake and
    /// authentication, and drain to the first ReadyForQuery.
    pub fn connect(&mut self) -> Result<()> {
        let span = tracing::info_span!(
            "startup",
            user = %self.config.username,
            database = %self.config.database()
        );
        let _guard = span.enter();

        self.config.validate()?;
        self.session = None;
        self.state.transition(ConnectionState::Connecting)?;

        match self.connect_inner() {
            Ok(()) => {
                self.state.transition(ConnectionState::Connected)?;
                tracing::info!("startup complete");
                Ok(())
            }
            Err(e) => {
                self.session = None;
                self.fail();
                Err(e)
            }
        }
    }

    fn connect_inner(&mut self) -> Result<()> {
        let transport = Transport::connect(&self.config.host, self.config.port)?;

        // TLS negotiation (unless disabled)
        let (transport, leftover) = if self.config.tls_mode != TlsMode::Disable {
            self.negotiate_tls(transport)?
        } else {
            (transport, BytesMut::new())
        };

        self.session = Some(Session::new(transport, leftover));

        // Build startup parameters
        let mut params = vec![
            ("user".to_string(), self.config.username.clone()),
            ("database".to_string(), self.config.database().to_string()),
        ];
        if let Some(app_name) = &self.config.application_name {
            params.push(("application_name".to_string(), app_name.clone()));
        }

        let startup = FrontendMessage::Startup {
            version: crate::protocol::constants::PROTOCOL_VERSION,
            params,
        };
        self.send_message(&startup)?;

        // Authentication loop, then drain to the first ReadyForQuery
        self.authenticate()
    }

    /// Negotiate TLS upgrade with the server via the SSLRequest protocol.
    ///
    /// Sends the 8-byte SSLRequest message and reads the server's
    /// single-byte response: `S` upgrades the transport, `N` continues in
    /// plaintext or fails depending on the configured mode, anything else
    /// is a protocol violation.
    fn negotiate_tls(&self, mut transport: Transport) -> Result<(Transport, BytesMut)> {
        let buf = encode_message(&FrontendMessage::SslRequest);
        transport.write_all(&buf)?;
        transport.flush()?;

        let mut read_buf = BytesMut::new();
        while read_buf.is_empty() {
            let n = transport.read_buf(&mut read_buf)?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }

        let response = read_buf[0];
        read_buf.advance(1);

        match response {
            b'S' => {
                tracing::debug!("server accepted TLS, upgrading connection");
                let tls_config = TlsConfig::from_config(&self.config)?;
                let transport = transport.upgrade_to_tls(&tls_config, &self.config.host)?;
                tracing::info!("TLS connection established");
                Ok((transport, read_buf))
            }
            b'N' => match self.config.tls_mode {
                TlsMode::Require => Err(Error::TlsRequiredButUnavailable),
                _ => {
                    tracing::debug!("server declined TLS, continuing in plaintext");
                    Ok((transport, read_buf))
                }
            },
            other => Err(Error::InvalidTlsResponse(other)),
        }
    }

    /// Handle authentication requests until the first ReadyForQuery
    fn authenticate(&mut self) -> Result<()> {
        let auth_start = std::time::Instant::now();
        let mut auth_mechanism = "none";

        loop {
            let msg = self.receive_message()?;

            match msg {
                BackendMessage::Authentication(auth) => match auth {
                    AuthenticationMessage::Ok => {
                        tracing::debug!("authentication successful");
                        crate::metrics::counters::auth_successful(auth_mechanism);
                        crate::metrics::histograms::auth_duration(
                            auth_mechanism,
                            auth_start.elapsed().as_millis() as u64,
                        );
                        // Keep reading: ParameterStatus / BackendKeyData
                        // arrive before ReadyForQuery
                    }
                    AuthenticationMessage::CleartextPassword => {
                        auth_mechanism = crate::metrics::labels::MECHANISM_CLEARTEXT;
                        crate::metrics::counters::auth_attempted(auth_mechanism);

                        let password = self.config.password.clone().ok_or_else(|| {
                            Error::Authentication("password required".into())
                        })?;
                        self.send_message(&FrontendMessage::Password(password))?;
                    }
                    AuthenticationMessage::Md5Password { .. } => {
                        return Err(Error::Authentication(
                            "MD5 authentication not supported; use SCRAM-SHA-256 or cleartext password".into(),
                        ));
                    }
                    AuthenticationMessage::Unsupported { code } => {
                        return Err(Error::Authentication(format!(
                            "unsupported authentication method requested by server (sub-code {})",
                            code
                        )));
                    }
                    AuthenticationMessage::Sasl { mechanisms } => {
                        auth_mechanism = crate::metrics::labels::MECHANISM_SCRAM;
                        crate::metrics::counters::auth_attempted(auth_mechanism);
                        self.handle_sasl(&mechanisms)?;
                    }
                    AuthenticationMessage::SaslContinue { .. } => {
                        return Err(Error::Protocol(
                            "unexpected SaslContinue outside of SASL flow".into(),
                        ));
                    }
                    AuthenticationMessage::SaslFinal { .. } => {
                        return Err(Error::Protocol(
                            "unexpected SaslFinal outside of SASL flow".into(),
                        ));
                    }
                },
                BackendMessage::BackendKeyData {
                    process_id,
                    secret_key,
                } => {
                    if let Some(session) = self.session.as_mut() {
                        session.process_id = Some(process_id);
                        session.secret_key = Some(secret_key);
                    }
                }
                BackendMessage::ParameterStatus { name, value } => {
                    tracing::debug!("parameter status: {} = {}", name, value);
                }
                BackendMessage::NoticeResponse(notice) => {
                    tracing::debug!("notice during startup: {}", notice);
                }
                BackendMessage::ReadyForQuery { .. } => {
                    break;
                }
                BackendMessage::ErrorResponse(err) => {
                    crate::metrics::counters::auth_failed(auth_mechanism, "server_error");
                    return Err(Error::Authentication(err.to_string()));
                }
                _ => {
                    return Err(Error::Protocol(format!(
                        "unexpected message during auth: {:?}",
                        msg
                    )));
                }
            }
        }

        Ok(())
    }

    /// Run the SCRAM-SHA-256 exchange
    fn handle_sasl(&mut self, mechanisms: &[String]) -> Result<()> {
        if !mechanisms.iter().any(|m| m == "SCRAM-SHA-256") {
            return Err(Error::Authentication(format!(
                "server does not support SCRAM-SHA-256; available: {}",
                mechanisms.join(", ")
            )));
        }

        let password = self.config.password.clone().ok_or_else(|| {
            Error::Authentication("password required for SCRAM authentication".into())
        })?;

        let mut scram = ScramClient::new(self.config.username.clone(), password);
        tracing::debug!("initiating SCRAM-SHA-256 authentication");

        // Send SaslInitialResponse with the client first message
        let client_first = scram.client_first();
        self.send_message(&FrontendMessage::SaslInitialResponse {
            mechanism: "SCRAM-SHA-256".to_string(),
            data: client_first.into_bytes(),
        })?;

        // Receive SaslContinue with the server first message
        let server_first_data = match self.receive_message()? {
            BackendMessage::Authentication(AuthenticationMessage::SaslContinue { data }) => data,
            BackendMessage::ErrorResponse(err) => {
                return Err(Error::Authentication(format!("SASL server error: {}", err)));
            }
            _ => {
                return Err(Error::Protocol(
                    "expected SaslContinue message during SASL authentication".into(),
                ));
            }
        };

        let server_first = String::from_utf8(server_first_data).map_err(|e| {
            Error::Authentication(format!("invalid UTF-8 in server first message: {}", e))
        })?;

        tracing::debug!("received SCRAM server first message");

        let (client_final, scram_state) = scram
            .client_final(&server_first)
            .map_err(|e| Error::Authentication(format!("SCRAM error: {}", e)))?;

        // Send SaslResponse with the client final message
        self.send_message(&FrontendMessage::SaslResponse {
            data: client_final.into_bytes(),
        })?;

        // Receive SaslFinal with the server signature
        let server_final_data = match self.receive_message()? {
            BackendMessage::Authentication(AuthenticationMessage::SaslFinal { data }) => data,
            BackendMessage::ErrorResponse(err) => {
                return Err(Error::Authentication(format!("SASL server error: {}", err)));
            }
            _ => {
                return Err(Error::Protocol(
                    "expected SaslFinal message during SASL authentication".into(),
                ));
            }
        };

        let server_final = String::from_utf8(server_final_data).map_err(|e| {
            Error::Authentication(format!("invalid UTF-8 in server final message: {}", e))
        })?;

        scram
            .verify_server_final(&server_final, &scram_state)
            .map_err(|e| match e {
                ScramError::SignatureMismatch => Error::ServerSignatureMismatch,
                other => Error::Authentication(format!("SCRAM verification failed: {}", other)),
            })?;

        tracing::debug!("SCRAM-SHA-256 authentication successful");
        Ok(())
    }

    /// Close the connection, sending Terminate if it is still usable
    pub fn close(&mut self) {
        if self.state == ConnectionState::Connected {
            let _ = self.send_message(&FrontendMessage::Terminate);
        }
        if let Some(mut session) = self.session.take() {
            let _ = session.transport.shutdown();
        }
        let _ = self.state.transition(ConnectionState::Disconnected);
    }

    /// Tear the session down and connect again with the same configuration
    pub fn reconnect(&mut self) -> Result<()> {
        self.close();
        self.connect()
    }

    /// Mark the connection unusable after a local fault
    pub(crate) fn fail(&mut self) {
        let _ = self.state.transition(ConnectionState::Error);
    }

    /// Look up the verb recorded for a prepared statement name
    pub(crate) fn statement_verb(&self, name: &str) -> Option<Verb> {
        self.session
            .as_ref()
            .and_then(|s| s.statements.get(name).copied())
    }

    /// Record (or replace) a prepared statement's verb
    pub(crate) fn record_statement(&mut self, name: &str, verb: Verb) {
        if let Some(session) = self.session.as_mut() {
            session.statements.insert(name.to_string(), verb);
        }
    }

    /// Send a single frontend message
    pub(crate) fn send_message(&mut self, msg: &FrontendMessage) -> Result<()> {
        let buf = encode_message(msg);
        self.send_raw(&buf)
    }

    /// Send several frontend messages coalesced into one write.
    ///
    /// Bind + Describe + Execute + Sync leave as a single TCP segment so
    /// the server never waits on a partial request.
    pub(crate) fn send_coalesced(&mut self, msgs: &[FrontendMessage]) -> Result<()> {
        let mut buf = BytesMut::new();
        for msg in msgs {
            encode_message_into(msg, &mut buf);
        }
        self.send_raw(&buf)
    }

    fn send_raw(&mut self, buf: &[u8]) -> Result<()> {
        let result = match self.session.as_mut() {
            Some(session) => session
                .transport
                .write_all(buf)
                .and_then(|_| session.transport.flush()),
            None => Err(Error::NotConnected),
        };
        if result.is_err() && self.session.is_some() {
            self.fail();
        }
        result
    }

    /// Receive the next backend message, growing the receive buffer as
    /// needed. Any I/O or framing fault marks the connection unusable.
    pub(crate) fn receive_message(&mut self) -> Result<BackendMessage> {
        loop {
            let decoded = match self.session.as_mut() {
                Some(session) => decode_message(&mut session.read_buf).map(|opt| {
                    opt.map(|(msg, consumed)| {
                        session.read_buf.advance(consumed);
                        msg
                    })
                }),
                None => return Err(Error::NotConnected),
            };

            match decoded {
                Ok(Some(msg)) => return Ok(msg),
                Ok(None) => {}
                Err(e) => {
                    self.fail();
                    return Err(e);
                }
            }

            // Frame incomplete: read more bytes into the session buffer
            let read = {
                let session = self.session.as_mut().ok_or(Error::NotConnected)?;
                let Session {
                    transport,
                    read_buf,
                    ..
                } = session;
                transport.read_buf(read_buf)
            };

            match read {
                Ok(0) => {
                    self.fail();
                    return Err(Error::ConnectionClosed);
                }
                Ok(_) => {}
                Err(e) => {
                    self.fail();
                    return Err(e);
                }
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
