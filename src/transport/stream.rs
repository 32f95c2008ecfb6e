//! Packets over a byte stream.
//!
//! Each packet travels as its 17 raw bytes, back to back. Useful for serial
//! bridges to a radio dongle and for exercising the link over real sockets.

use crate::core::codec::PacketCodec;
use crate::core::packet::Packet;
use crate::error::Result;
use crate::transport::{ChunkTransport, PacketStream};
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::instrument;

/// Writes packets to an `AsyncWrite`
pub struct StreamTransport<W> {
    sink: Mutex<FramedWrite<W, PacketCodec>>,
}

impl<W> StreamTransport<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            sink: Mutex::new(FramedWrite::new(writer, PacketCodec)),
        }
    }
}

impl<W> ChunkTransport for StreamTransport<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn write_chunk(&self, packet: Packet) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut sink = self.sink.lock().await;
            sink.send(packet).await
        })
    }
}

/// Packet stream over an `AsyncRead`
pub fn reader<R>(reader: R) -> PacketStream
where
    R: AsyncRead + Unpin + Send + 'static,
{
    FramedRead::new(reader, PacketCodec).boxed()
}

/// Split a duplex stream into a transport and an inbound packet stream
#[instrument(skip_all)]
pub fn split<T>(io: T) -> (StreamTransport<WriteHalf<T>>, PacketStream)
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(io);
    (StreamTransport::new(write_half), reader(read_half))
}
