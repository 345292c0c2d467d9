//! Wire protocol layer
//!
//! This module handles:
//! * Protocol constants (message tags, auth sub-codes, format codes)
//! * Frontend and backend message types
//! * Message framing (length-prefixed encode/decode)

pub mod constants;
pub mod decode;
pub mod encode;
pub mod message;

pub use constants::Format;
pub use decode::decode_message;
pub use encode::{encode_message, encode_message_into};
pub use message::{
    AuthenticationMessage, BackendMessage, ErrorFields, FieldDescription, FrontendMessage,
};
