//! Tokio codec for carrying packets over a byte stream.
//!
//! Packets have a fixed length, so framing is just slicing the stream into
//! 17-byte records. Used by [`StreamTransport`](crate::transport::stream::StreamTransport)
//! for serial bridges and test sockets.

use crate::core::packet::{Packet, PACKET_LEN};
use crate::error::ProtocolError;
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Clone, Copy, Default)]
pub struct PacketCodec;

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, Self::Error> {
        if src.len() < PACKET_LEN {
            src.reserve(PACKET_LEN - src.len());
            return Ok(None);
        }
        let frame = src.split_to(PACKET_LEN);
        Packet::from_bytes(&frame).map(Some)
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(PACKET_LEN);
        dst.put_slice(&packet.to_bytes());
        Ok(())
    }
}
