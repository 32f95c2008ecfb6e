//! In-memory loopback transport.

use crate::core::packet::Packet;
use crate::error::{constants, ProtocolError, Result};
use crate::transport::{ChunkTransport, PacketStream};
use futures::future::BoxFuture;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Sending half of an in-memory channel
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    tx: mpsc::Sender<Packet>,
}

impl ChunkTransport for MemoryTransport {
    fn write_chunk(&self, packet: Packet) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.tx.send(packet).await.map_err(|_| {
                debug!("{}", constants::ERR_PEER_GONE);
                ProtocolError::ConnectionClosed
            })
        })
    }
}

/// One-directional channel: packets written to the transport come out of the stream
pub fn channel(capacity: usize) -> (MemoryTransport, PacketStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let stream = ReceiverStream::new(rx).map(Ok::<Packet, ProtocolError>).boxed();
    (MemoryTransport { tx }, stream)
}

/// Two cross-connected endpoints, `(transport, inbound)` for each side
pub fn pair(capacity: usize) -> ((MemoryTransport, PacketStream), (MemoryTransport, PacketStream)) {
    let (a_tx, b_rx) = channel(capacity);
    let (b_tx, a_rx) = channel(capacity);
    ((a_tx, a_rx), (b_tx, b_rx))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::packet::{Control, PAYLOAD_LEN};

    #[tokio::test]
    async fn test_pair_is_cross_connected() {
        let ((a, mut a_in), (b, mut b_in)) = pair(4);
        let p = Packet::new([1; PAYLOAD_LEN], Control::from_bits(Control::START));
        a.write_chunk(p).await.unwrap();
        assert_eq!(b_in.next().await.unwrap().unwrap(), p);

        b.write_chunk(p).await.unwrap();
        assert_eq!(a_in.next().await.unwrap().unwrap(), p);
    }

    #[tokio::test]
    async fn test_write_after_receiver_dropped() {
        let (tx, rx) = channel(1);
        drop(rx);
        let p = Packet::new([0; PAYLOAD_LEN], Control::default());
        assert!(matches!(
            tx.write_chunk(p).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }
}
