//! # Error Types
//!
//! Error handling for the schema compiler, the value codec and the link layer.
//!
//! ## Error Categories
//! - **Schema Errors**: unresolved references, unsupported constructs, duplicates
//! - **Codec Errors**: size mismatches, out-of-range values, truncated buffers
//! - **Cryptographic Errors**: encryption/decryption and block-length failures
//! - **Link Errors**: oversized messages, malformed envelopes, closed connections
//!
//! Schema errors are raised synchronously by [`compile_schema`](crate::schema::compile_schema)
//! and nothing partially compiled is returned. Codec errors fail only the call that
//! produced them; other queued or parked messages are unaffected.
//!
//! ## Example Usage
//! ```rust
//! use cubelink::error::{ProtocolError, Result};
//! use cubelink::schema::{Primitive, TypeDescriptor, Value};
//!
//! fn encode_byte(v: i64) -> Result<Vec<u8>> {
//!     TypeDescriptor::Primitive(Primitive::Uint8).encode_to_vec(&Value::Int(v))
//! }
//!
//! assert!(encode_byte(7).is_ok());
//! assert!(matches!(encode_byte(300), Err(ProtocolError::ValueOutOfRange { .. })));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Link errors
    pub const ERR_SEND_TASK_STOPPED: &str = "Send task is no longer running";
    pub const ERR_PEER_GONE: &str = "Peer endpoint dropped";
    pub const ERR_DISPATCHER_LOCK: &str = "Dispatcher lock poisoned";

    /// Cryptographic errors
    pub const ERR_RNG_UNAVAILABLE: &str = "Operating system RNG unavailable";
    pub const ERR_CIPHERTEXT_TOO_SHORT: &str = "Ciphertext shorter than IV";

    /// Pairing errors
    pub const ERR_PEER_RANDOM_NOT_SET: &str = "Peer random not received";
    pub const ERR_PIN_OUT_OF_RANGE: &str = "PIN has more digits than configured";

    /// Schema errors
    pub const ERR_UNION_ARRAY_MEMBER: &str = "Union members cannot be arrays";
    pub const ERR_NON_INTEGER_INDEX: &str = "Array and string index must be an integer type";
    pub const ERR_ARRAY_WITHOUT_SIZE: &str = "Array needs either a fixed size or an index type";
    pub const ERR_STRUCT_CONTAINS_ITSELF: &str = "Struct contains itself by value";
}

/// Primary error type for all schema, codec and link operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Undefined type: {0}")]
    UndefinedType(String),

    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    #[error("Duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("Array size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Value {value} out of range for {target}")]
    ValueOutOfRange { value: String, target: &'static str },

    #[error("Missing struct field: {0}")]
    MissingField(String),

    #[error("Unknown union tag: {0}")]
    UnknownTag(u8),

    #[error("Buffer truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("Decryption failed")]
    DecryptionFailure,

    #[error("Encryption failed: {0}")]
    EncryptionFailure(String),

    #[error("Block cipher input must be a multiple of 16 bytes, got {0}")]
    InvalidBlockLength(usize),

    #[error("Message too large: {0} bytes")]
    OversizedMessage(usize),

    #[error("Malformed message envelope")]
    MalformedEnvelope,

    #[error("Invalid packet length: {0} bytes")]
    InvalidPacket(usize),

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProtocolError {
    /// Whether this error was raised while compiling a schema
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::SchemaError(_)
                | ProtocolError::UndefinedType(_)
                | ProtocolError::UnsupportedConstruct(_)
                | ProtocolError::DuplicateSymbol(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
