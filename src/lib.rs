//! # cubelink
//!
//! Schema-driven binary messages over a narrow, chunked radio link.
//!
//! Two engines cooperate:
//!
//! - [`schema`] compiles an interface-definition AST into type descriptors
//!   that encode and decode structured values to flat little-endian buffers.
//! - [`protocol`] slices encoded messages into 16-byte packets flagged
//!   start/end/encrypted, paces them onto a [`transport`], reassembles
//!   inbound packets, and encrypts traffic once a PIN-authenticated
//!   Diffie-Hellman pairing has produced a session key.
//!
//! ## Quick Start
//! ```rust,no_run
//! use cubelink::config::LinkConfig;
//! use cubelink::protocol::{Connection, LinkEvent};
//! use cubelink::transport::memory;
//!
//! # async fn run() -> cubelink::error::Result<()> {
//! let config = LinkConfig::default();
//! let ((tx, inbound), _peer) = memory::pair(16);
//! let (conn, mut events) = Connection::new(tx, config.framer.clone());
//! conn.send(1, b"hello").await?;
//! conn.run_inbound(inbound).await?;
//! while let Some(LinkEvent::Message { tag, payload, .. }) = events.recv().await {
//!     println!("{tag}: {payload:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod schema;
pub mod transport;
pub mod utils;

pub use error::{ProtocolError, Result};
