//! # Link Protocol
//!
//! Message framing, the per-connection session, PIN pairing and tag
//! dispatch.
//!
//! ## Components
//! - **Framer**: envelope, random padding, packet slicing and reassembly
//! - **Connection**: paced outbound queue, inbound delivery, parked encrypted messages
//! - **Handshake**: PIN-gated Diffie-Hellman producing the session key
//! - **Dispatcher**: routes messages by tag to schema-typed handlers
//!
//! ## Message Flow
//! ```text
//! send(tag, payload) → [len, tag, payload, filler] → (AES-CFB) → 16-byte packets
//!                    → queue → one packet per tick → transport
//! transport → packets → reassemble on end → (decrypt or park) → LinkEvent
//! ```

pub mod connection;
pub mod dispatcher;
pub mod framer;
pub mod handshake;

pub use connection::{Connection, LinkEvent};
pub use dispatcher::Dispatcher;
pub use handshake::{PairingState, SessionKey};
