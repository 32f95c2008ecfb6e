//! # Core Packet Components
//!
//! Fixed-size radio packets and their byte-stream codec.
//!
//! ## Components
//! - **Packet**: 16-byte payload plus a start/end/encrypted control byte
//! - **Codec**: Tokio codec slicing a byte stream into packets
//!
//! ## Wire Format
//! ```text
//! [Payload(16)] [Control(1)]
//! ```

pub mod codec;
pub mod packet;
