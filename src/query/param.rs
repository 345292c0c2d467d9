//! Parameter values for bound statements

use crate::protocol::Format;

/// A parameter value for the extended protocol, or for inlining into a
/// simple-protocol `EXECUTE`.
///
/// Each variant carries a native Rust value; the wire shape (big-endian
/// bytes, `-1` length for NULL) is derived at encode time.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// SQL NULL; encoded as length -1 with no payload
    Null,
    /// Boolean; one byte, 0x01 or 0x00
    Bool(bool),
    /// 16-bit integer, big-endian
    Int2(i16),
    /// 32-bit integer, big-endian
    Int4(i32),
    /// 64-bit integer, big-endian
    Int8(i64),
    /// 32-bit float, big-endian IEEE 754
    Float4(f32),
    /// 64-bit float, big-endian IEEE 754
    Float8(f64),
    /// Text, sent verbatim
    Text(String),
}

impl Param {
    /// Whether this parameter is SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Param::Null)
    }

    /// Wire format flag sent in the Bind message
    pub fn format(&self) -> Format {
        match self {
            Param::Null | Param::Text(_) => Format::Text,
            _ => Format::Binary,
        }
    }

    /// Encode the value bytes for Bind; `None` means NULL (length -1 on
    /// the wire)
    pub fn encode(&self) -> Option<Vec<u8>> {
        match self {
            Param::Null => None,
            Param::Bool(v) => Some(vec![u8::from(*v)]),
            Param::Int2(v) => Some(v.to_be_bytes().to_vec()),
            Param::Int4(v) => Some(v.to_be_bytes().to_vec()),
            Param::Int8(v) => Some(v.to_be_bytes().to_vec()),
            Param::Float4(v) => Some(v.to_be_bytes().to_vec()),
            Param::Float8(v) => Some(v.to_be_bytes().to_vec()),
            Param::Text(v) => Some(v.as_bytes().to_vec()),
        }
    }

    /// Render the value as a SQL literal, for the simple-protocol
    /// `EXECUTE name (...)` form. Single quotes in text are doubled.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Param::Null => "NULL".to_string(),
            Param::Bool(true) => "TRUE".to_string(),
            Param::Bool(false) => "FALSE".to_string(),
            Param::Int2(v) => v.to_string(),
            Param::Int4(v) => v.to_string(),
            Param::Int8(v) => v.to_string(),
            Param::Float4(v) => v.to_string(),
            Param::Float8(v) => v.to_string(),
            Param::Text(v) => format!("'{}'", v.replace('\'', "''")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_encodes_as_none() {
        assert!(Param::Null.encode().is_none());
        assert!(Param::Null.is_null());
    }

    #[test]
    fn test_int_encoding_is_big_endian() {
        assert_eq!(Param::Int2(258).encode().unwrap(), vec![1, 2]);
        assert_eq!(Param::Int4(42).encode().unwrap(), vec![0, 0, 0, 42]);
        assert_eq!(
            Param::Int8(-1).encode().unwrap(),
            vec![0xFF; 8]
        );
    }

    #[test]
    fn test_float_encoding_is_big_endian() {
        assert_eq!(
            Param::Float8(1.5).encode().unwrap(),
            1.5f64.to_be_bytes().to_vec()
        );
        assert_eq!(Param::Float4(0.0).encode().unwrap().len(), 4);
    }

    #[test]
    fn test_bool_encoding() {
        assert_eq!(Param::Bool(true).encode().unwrap(), vec![1]);
        assert_eq!(Param::Bool(false).encode().unwrap(), vec![0]);
    }

    #[test]
    fn test_text_encoding_is_verbatim() {
        assert_eq!(
            Param::Text("héllo".to_string()).encode().unwrap(),
            "héllo".as_bytes().to_vec()
        );
    }

    #[test]
    fn test_format_flags() {
        assert_eq!(Param::Text("x".into()).format(), Format::Text);
        assert_eq!(Param::Null.format(), Format::Text);
        assert_eq!(Param::Int4(1).format(), Format::Binary);
        assert_eq!(Param::Bool(true).format(), Format::Binary);
    }

    #[test]
    fn test_sql_literals() {
        assert_eq!(Param::Int4(42).to_sql_literal(), "42");
        assert_eq!(Param::Null.to_sql_literal(), "NULL");
        assert_eq!(Param::Bool(true).to_sql_literal(), "TRUE");
        assert_eq!(
            Param::Text("it's".to_string()).to_sql_literal(),
            "'it''s'"
        );
    }
}
