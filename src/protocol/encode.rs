//! Protocol message encoding

use super::constants::frontend_tags;
use super::message::FrontendMessage;
use crate::query::Param;
use bytes::{BufMut, BytesMut};

/// Encode a frontend message into bytes
pub fn encode_message(msg: &FrontendMessage) -> BytesMut {
    let mut buf = BytesMut::new();
    encode_message_into(msg, &mut buf);
    buf
}

/// Encode a frontend message into an existing buffer.
///
/// Used to coalesce Bind + Describe + Execute + Sync into a single write.
pub fn encode_message_into(msg: &FrontendMessage, buf: &mut BytesMut) {
    match msg {
        FrontendMessage::Startup { version, params } => {
            encode_startup(buf, *version, params);
        }
        FrontendMessage::Password(password) => {
            encode_password(buf, password);
        }
        FrontendMessage::Query(query) => {
            encode_query(buf, query);
        }
        FrontendMessage::Parse { name, sql } => {
            encode_parse(buf, name, sql);
        }
        FrontendMessage::Bind {
            portal,
            statement,
            params,
        } => {
            encode_bind(buf, portal, statement, params);
        }
        FrontendMessage::Describe { kind, name } => {
            encode_describe(buf, *kind, name);
        }
        FrontendMessage::Execute { portal, max_rows } => {
            encode_execute(buf, portal, *max_rows);
        }
        FrontendMessage::Sync => {
            encode_empty(buf, frontend_tags::SYNC);
        }
        FrontendMessage::Terminate => {
            encode_empty(buf, frontend_tags::TERMINATE);
        }
        FrontendMessage::SaslInitialResponse { mechanism, data } => {
            encode_sasl_initial_response(buf, mechanism, data);
        }
        FrontendMessage::SaslResponse { data } => {
            encode_sasl_response(buf, data);
        }
        FrontendMessage::SslRequest => {
            encode_ssl_request(buf);
        }
    }
}

fn encode_startup(buf: &mut BytesMut, version: i32, params: &[(String, String)]) {
    // Startup messages don't have a type byte
    // Reserve space for length (will be filled at end)
    let len_pos = buf.len();
    buf.put_i32(0);

    // Protocol version
    buf.put_i32(version);

    // Parameters (key-value pairs, null-terminated)
    for (key, value) in params {
        buf.put(key.as_bytes());
        buf.put_u8(0);
        buf.put(value.as_bytes());
        buf.put_u8(0);
    }

    // Final null terminator
    buf.put_u8(0);

    fill_length(buf, len_pos);
}

fn encode_password(buf: &mut BytesMut, password: &str) {
    buf.put_u8(frontend_tags::PASSWORD);
    let len_pos = buf.len();
    buf.put_i32(0);

    buf.put(password.as_bytes());
    buf.put_u8(0);

    fill_length(buf, len_pos);
}

fn encode_query(buf: &mut BytesMut, query: &str) {
    buf.put_u8(frontend_tags::QUERY);
    let len_pos = buf.len();
    buf.put_i32(0);

    buf.put(query.as_bytes());
    buf.put_u8(0);

    fill_length(buf, len_pos);
}

fn encode_parse(buf: &mut BytesMut, name: &str, sql: &str) {
    buf.put_u8(frontend_tags::PARSE);
    let len_pos = buf.len();
    buf.put_i32(0);

    // Statement name (null-terminated)
    buf.put(name.as_bytes());
    buf.put_u8(0);

    // SQL text (null-terminated)
    buf.put(sql.as_bytes());
    buf.put_u8(0);

    // Parameter type count: 0, the server infers every type
    buf.put_i16(0);

    fill_length(buf, len_pos);
}

fn encode_bind(buf: &mut BytesMut, portal: &str, statement: &str, params: &[Param]) {
    buf.put_u8(frontend_tags::BIND);
    let len_pos = buf.len();
    buf.put_i32(0);

    // Portal name (null-terminated)
    buf.put(portal.as_bytes());
    buf.put_u8(0);

    // Statement name (null-terminated)
    buf.put(statement.as_bytes());
    buf.put_u8(0);

    // Per-parameter format codes
    buf.put_i16(params.len() as i16);
    for param in params {
        buf.put_i16(param.format() as i16);
    }

    // Parameter values; NULL is length -1 with no bytes
    buf.put_i16(params.len() as i16);
    for param in params {
        match param.encode() {
            Some(bytes) => {
                buf.put_i32(bytes.len() as i32);
                buf.put_slice(&bytes);
            }
            None => buf.put_i32(-1),
        }
    }

    // Result format count: 0 means every column arrives in text format
    buf.put_i16(0);

    fill_length(buf, len_pos);
}

fn encode_describe(buf: &mut BytesMut, kind: u8, name: &str) {
    buf.put_u8(frontend_tags::DESCRIBE);
    let len_pos = buf.len();
    buf.put_i32(0);

    buf.put_u8(kind);
    buf.put(name.as_bytes());
    buf.put_u8(0);

    fill_length(buf, len_pos);
}

fn encode_execute(buf: &mut BytesMut, portal: &str, max_rows: i32) {
    buf.put_u8(frontend_tags::EXECUTE);
    let len_pos = buf.len();
    buf.put_i32(0);

    buf.put(portal.as_bytes());
    buf.put_u8(0);
    buf.put_i32(max_rows);

    fill_length(buf, len_pos);
}

fn encode_empty(buf: &mut BytesMut, tag: u8) {
    buf.put_u8(tag);
    buf.put_i32(4); // Length includes itself
}

fn encode_sasl_initial_response(buf: &mut BytesMut, mechanism: &str, data: &[u8]) {
    buf.put_u8(frontend_tags::PASSWORD);
    let len_pos = buf.len();
    buf.put_i32(0);

    // Mechanism name (null-terminated)
    buf.put(mechanism.as_bytes());
    buf.put_u8(0);

    // SASL data (as length-prefixed bytes)
    buf.put_i32(data.len() as i32);
    buf.put_slice(data);

    fill_length(buf, len_pos);
}

fn encode_sasl_response(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u8(frontend_tags::PASSWORD);
    let len_pos = buf.len();
    buf.put_i32(0);

    buf.put_slice(data);

    fill_length(buf, len_pos);
}

fn encode_ssl_request(buf: &mut BytesMut) {
    buf.put_i32(8); // Length (includes itself)
    buf.put_i32(super::constants::SSL_REQUEST_CODE);
}

/// Rewrite the i32 length prefix at `len_pos` after the body is buffered
fn fill_length(buf: &mut BytesMut, len_pos: usize) {
    let len = buf.len() - len_pos;
    buf[len_pos..len_pos + 4].copy_from_slice(&(len as i32).to_be_bytes());
}
