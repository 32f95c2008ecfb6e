//! # Transport Layer
//!
//! The link only needs "write one chunk" outbound and a stream of packets
//! inbound. Radio stacks implement [`ChunkTransport`] directly; this module
//! ships two adapters.
//!
//! ## Adapters
//! - **memory**: in-process channel pair, used for simulation and tests
//! - **stream**: 17-byte packets over any `AsyncRead + AsyncWrite` (serial
//!   bridges, sockets) via [`PacketCodec`](crate::core::codec::PacketCodec)

use crate::core::packet::Packet;
use crate::error::Result;
use futures::future::BoxFuture;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

pub mod memory;
pub mod stream;

/// Outbound side of a link: delivers one packet to the peer
pub trait ChunkTransport: Send + Sync + 'static {
    fn write_chunk(&self, packet: Packet) -> BoxFuture<'_, Result<()>>;
}

impl<T: ChunkTransport + ?Sized> ChunkTransport for Arc<T> {
    fn write_chunk(&self, packet: Packet) -> BoxFuture<'_, Result<()>> {
        (**self).write_chunk(packet)
    }
}

/// Inbound side of a link
pub type PacketStream = Pin<Box<dyn Stream<Item = Result<Packet>> + Send>>;
