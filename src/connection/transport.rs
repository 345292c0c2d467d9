//! Transport abstraction (plain TCP vs TLS-encrypted TCP)

use crate::{Error, Result};
use bytes::BytesMut;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

/// Blocking byte transport: plain or TLS-encrypted TCP
#[allow(clippy::large_enum_variant)]
pub enum Transport {
    /// Plain TCP connection
    Plain(TcpStream),
    /// TLS-encrypted TCP connection
    Tls(Box<rustls::StreamOwned<rustls::ClientConnection, TcpStream>>),
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Plain(_) => f.write_str("Transport::Plain(TcpStream)"),
            Transport::Tls(_) => f.write_str("Transport::Tls(TlsStream)"),
        }
    }
}

impl Transport {
    /// Connect via plain TCP.
    ///
    /// Nagle's algorithm is disabled so that coalesced extended-protocol
    /// writes (Bind + Describe + Execute + Sync) leave immediately.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        Ok(Transport::Plain(stream))
    }

    /// Write all bytes to the transport, retrying partial writes
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.write_all(buf)?,
            Transport::Tls(stream) => stream.write_all(buf)?,
        }
        Ok(())
    }

    /// Flush the transport
    pub fn flush(&mut self) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.flush()?,
            Transport::Tls(stream) => stream.flush()?,
        }
        Ok(())
    }

    /// Read available bytes into the buffer; returns the count, with 0
    /// meaning the peer closed the connection
    pub fn read_buf(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let mut chunk = [0u8; 8192];
        let n = match self {
            Transport::Plain(stream) => stream.read(&mut chunk)?,
            Transport::Tls(stream) => stream.read(&mut chunk)?,
        };
        buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Upgrade a plain TCP transport to TLS after SSLRequest negotiation.
    ///
    /// Consumes `self` and returns a new `Transport` whose handshake is
    /// driven by the first read or write. Returns an error if the
    /// transport is already encrypted.
    pub fn upgrade_to_tls(
        self,
        tls_config: &super::TlsConfig,
        hostname: &str,
    ) -> Result<Self> {
        match self {
            Transport::Plain(tcp_stream) => {
                let server_name = super::tls::parse_server_name(hostname)?;
                let server_name = rustls_pki_types::ServerName::try_from(server_name)
                    .map_err(|_| Error::Tls(format!("invalid hostname for TLS: {}", hostname)))?;

                let tls_conn =
                    rustls::ClientConnection::new(tls_config.client_config(), server_name)
                        .map_err(|e| Error::Tls(format!("TLS setup failed: {}", e)))?;

                Ok(Transport::Tls(Box::new(rustls::StreamOwned::new(
                    tls_conn, tcp_stream,
                ))))
            }
            Transport::Tls(_) => Err(Error::Tls("transport is already TLS-encrypted".into())),
        }
    }

    /// Shutdown the transport
    pub fn shutdown(&mut self) -> Result<()> {
        match self {
            Transport::Plain(stream) => stream.shutdown(Shutdown::Both)?,
            Transport::Tls(stream) => {
                stream.conn.send_close_notify();
                let _ = stream.flush();
                stream.sock.shutdown(Shutdown::Both)?;
            }
        }
        Ok(())
    }
}
