//! Protocol message decoding

use super::constants::{auth, tags, MAX_MESSAGE_LENGTH};
use super::message::{AuthenticationMessage, BackendMessage, ErrorFields, FieldDescription};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};

/// Decode one backend message from the front of `data` without cloning.
///
/// Returns `Ok(None)` when the buffer does not yet hold a complete frame;
/// the caller reads more bytes and retries. On success returns the message
/// and the number of bytes consumed (type byte plus length-prefixed body);
/// the caller must advance the buffer by that amount.
///
/// Length fields below 4 or above [`MAX_MESSAGE_LENGTH`] are protocol
/// errors, rejected before any body is read.
pub fn decode_message(data: &mut BytesMut) -> Result<Option<(BackendMessage, usize)>> {
    if data.len() < 5 {
        return Ok(None);
    }

    let tag = data[0];
    let len = i32::from_be_bytes([data[1], data[2], data[3], data[4]]);

    if len < 4 {
        return Err(Error::Protocol(format!(
            "message length {} is below the 4-byte minimum",
            len
        )));
    }
    let len = len as usize;

    if len > MAX_MESSAGE_LENGTH {
        return Err(Error::Protocol(format!(
            "message length {} exceeds maximum allowed {}",
            len, MAX_MESSAGE_LENGTH
        )));
    }

    if data.len() < len + 1 {
        return Ok(None);
    }

    // Body slice: after the tag and length prefix, `len - 4` bytes
    let msg_data = &data[5..len + 1];

    let msg = match tag {
        tags::AUTHENTICATION => decode_authentication(msg_data)?,
        tags::BACKEND_KEY_DATA => decode_backend_key_data(msg_data)?,
        tags::BIND_COMPLETE => BackendMessage::BindComplete,
        tags::CLOSE_COMPLETE => BackendMessage::CloseComplete,
        tags::COMMAND_COMPLETE => decode_command_complete(msg_data)?,
        tags::DATA_ROW => decode_data_row(msg_data)?,
        tags::EMPTY_QUERY_RESPONSE => BackendMessage::EmptyQueryResponse,
        tags::ERROR_RESPONSE => BackendMessage::ErrorResponse(decode_error_fields(msg_data)?),
        tags::NO_DATA => BackendMessage::NoData,
        tags::NOTICE_RESPONSE => BackendMessage::NoticeResponse(decode_error_fields(msg_data)?),
        tags::PARAMETER_DESCRIPTION => decode_parameter_description(msg_data)?,
        tags::PARAMETER_STATUS => decode_parameter_status(msg_data)?,
        tags::PARSE_COMPLETE => BackendMessage::ParseComplete,
        tags::PORTAL_SUSPENDED => BackendMessage::PortalSuspended,
        tags::READY_FOR_QUERY => decode_ready_for_query(msg_data)?,
        tags::ROW_DESCRIPTION => decode_row_description(msg_data)?,
        _ => {
            return Err(Error::Protocol(format!(
                "unknown message tag: 0x{:02X}",
                tag
            )))
        }
    };

    Ok(Some((msg, len + 1)))
}

fn decode_authentication(data: &[u8]) -> Result<BackendMessage> {
    if data.len() < 4 {
        return Err(Error::Protocol("truncated authentication message".into()));
    }
    let auth_type = i32::from_be_bytes([data[0], data[1], data[2], data[3]]);

    let auth_msg = match auth_type {
        auth::OK => AuthenticationMessage::Ok,
        auth::CLEARTEXT_PASSWORD => AuthenticationMessage::CleartextPassword,
        auth::MD5_PASSWORD => {
            if data.len() < 8 {
                return Err(Error::Protocol("truncated MD5 salt".into()));
            }
            let mut salt = [0u8; 4];
            salt.copy_from_slice(&data[4..8]);
            AuthenticationMessage::Md5Password { salt }
        }
        auth::SASL => {
            // Mechanism list: null-terminated strings followed by an extra null
            let mut mechanisms = Vec::new();
            let remaining = &data[4..];
            let mut offset = 0;
            loop {
                if offset >= remaining.len() {
                    break;
                }
                match remaining[offset..].iter().position(|&b| b == 0) {
                    Some(end) => {
                        let mechanism =
                            String::from_utf8_lossy(&remaining[offset..offset + end]).to_string();
                        if mechanism.is_empty() {
                            break;
                        }
                        mechanisms.push(mechanism);
                        offset += end + 1;
                    }
                    None => break,
                }
            }
            AuthenticationMessage::Sasl { mechanisms }
        }
        auth::SASL_CONTINUE => AuthenticationMessage::SaslContinue {
            data: data[4..].to_vec(),
        },
        auth::SASL_FINAL => AuthenticationMessage::SaslFinal {
            data: data[4..].to_vec(),
        },
        auth::KERBEROS_V5 | auth::SCM_CREDENTIAL | auth::GSS | auth::SSPI => {
            AuthenticationMessage::Unsupported { code: auth_type }
        }
        _ => {
            return Err(Error::Protocol(format!(
                "unknown authentication sub-code: {}",
                auth_type
            )))
        }
    };

    Ok(BackendMessage::Authentication(auth_msg))
}

fn decode_backend_key_data(data: &[u8]) -> Result<BackendMessage> {
    if data.len() < 8 {
        return Err(Error::Protocol("truncated backend key data".into()));
    }
    let process_id = i32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let secret_key = i32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    Ok(BackendMessage::BackendKeyData {
        process_id,
        secret_key,
    })
}

fn decode_command_complete(data: &[u8]) -> Result<BackendMessage> {
    let end = data
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::Protocol("missing null terminator in command tag".into()))?;
    let tag = String::from_utf8_lossy(&data[..end]).to_string();
    Ok(BackendMessage::CommandComplete(tag))
}

fn decode_data_row(data: &[u8]) -> Result<BackendMessage> {
    if data.len() < 2 {
        return Err(Error::Protocol("truncated data row".into()));
    }
    let field_count = i16::from_be_bytes([data[0], data[1]]) as usize;
    let mut fields = Vec::with_capacity(field_count);
    let mut offset = 2;

    for _ in 0..field_count {
        if offset + 4 > data.len() {
            return Err(Error::Protocol("truncated data row field length".into()));
        }
        let field_len = i32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]);
        offset += 4;

        let field = if field_len == -1 {
            None
        } else {
            let len = field_len as usize;
            if offset + len > data.len() {
                return Err(Error::Protocol("truncated data row field".into()));
            }
            let field_bytes = Bytes::copy_from_slice(&data[offset..offset + len]);
            offset += len;
            Some(field_bytes)
        };
        fields.push(field);
    }

    Ok(BackendMessage::DataRow(fields))
}

fn decode_error_fields(data: &[u8]) -> Result<ErrorFields> {
    let mut fields = ErrorFields::default();
    let mut offset = 0;

    loop {
        if offset >= data.len() {
            break;
        }
        let field_type = data[offset];
        offset += 1;
        if field_type == 0 {
            break;
        }

        let end = data[offset..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::Protocol("missing null terminator in error field".into()))?;
        let value = String::from_utf8_lossy(&data[offset..offset + end]).to_string();
        offset += end + 1;

        match field_type {
            b'S' => fields.severity = Some(value),
            b'C' => fields.code = Some(value),
            b'M' => fields.message = Some(value),
            b'D' => fields.detail = Some(value),
            b'H' => fields.hint = Some(value),
            b'P' => fields.position = Some(value),
            _ => {} // Ignore unknown fields
        }
    }

    Ok(fields)
}

fn decode_parameter_description(data: &[u8]) -> Result<BackendMessage> {
    if data.len() < 2 {
        return Err(Error::Protocol("truncated parameter description".into()));
    }
    let count = i16::from_be_bytes([data[0], data[1]]) as usize;
    let mut type_oids = Vec::with_capacity(count);
    let mut offset = 2;

    for _ in 0..count {
        if offset + 4 > data.len() {
            return Err(Error::Protocol("truncated parameter description".into()));
        }
        type_oids.push(u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]));
        offset += 4;
    }

    Ok(BackendMessage::ParameterDescription { type_oids })
}

fn decode_parameter_status(data: &[u8]) -> Result<BackendMessage> {
    let mut offset = 0;

    let name_end = data[offset..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::Protocol("missing null terminator in parameter name".into()))?;
    let name = String::from_utf8_lossy(&data[offset..offset + name_end]).to_string();
    offset += name_end + 1;

    if offset >= data.len() {
        return Err(Error::Protocol("truncated parameter status".into()));
    }
    let value_end = data[offset..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::Protocol("missing null terminator in parameter value".into()))?;
    let value = String::from_utf8_lossy(&data[offset..offset + value_end]).to_string();

    Ok(BackendMessage::ParameterStatus { name, value })
}

fn decode_ready_for_query(data: &[u8]) -> Result<BackendMessage> {
    if data.is_empty() {
        return Err(Error::Protocol("missing transaction status byte".into()));
    }
    Ok(BackendMessage::ReadyForQuery { status: data[0] })
}

fn decode_row_description(data: &[u8]) -> Result<BackendMessage> {
    if data.len() < 2 {
        return Err(Error::Protocol("truncated row description".into()));
    }
    let field_count = i16::from_be_bytes([data[0], data[1]]) as usize;
    let mut fields = Vec::with_capacity(field_count);
    let mut offset = 2;

    for _ in 0..field_count {
        // Column name (null-terminated string)
        let name_end = data[offset..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::Protocol("missing null terminator in field name".into()))?;
        let name = String::from_utf8_lossy(&data[offset..offset + name_end]).to_string();
        offset += name_end + 1;

        // Fixed-width descriptor: 4+2+4+2+4+2 = 18 bytes
        if offset + 18 > data.len() {
            return Err(Error::Protocol("truncated field descriptor".into()));
        }
        let table_oid = i32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]);
        offset += 4;
        let column_attr = i16::from_be_bytes([data[offset], data[offset + 1]]);
        offset += 2;
        let type_oid = u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]);
        offset += 4;
        let type_size = i16::from_be_bytes([data[offset], data[offset + 1]]);
        offset += 2;
        let type_modifier = i32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]);
        offset += 4;
        let format_code = i16::from_be_bytes([data[offset], data[offset + 1]]);
        offset += 2;

        fields.push(FieldDescription {
            name,
            table_oid,
            column_attr,
            type_oid,
            type_size,
            type_modifier,
            format_code,
        });
    }

    Ok(BackendMessage::RowDescription(fields))
}
