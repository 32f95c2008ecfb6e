//! Message framing: envelope, padding, encryption and packet slicing.
//!
//! ## Envelope
//! ```text
//! [Length(1)] [Tag(1)] [Payload(Length)] [Random filler up to a multiple of 16]
//! ```
//!
//! When a session key is present the whole padded envelope is encrypted in
//! stream mode (`IV ‖ ciphertext`, still a multiple of 16) before slicing.
//! The first packet of a message carries `start`, the last carries `end` and,
//! if encrypted, `encrypted`.
//!
//! ## Reassembly
//! `start` clears the buffer, every payload is appended, `end` yields the
//! concatenation. A fragment arriving without a preceding `start` is appended
//! to whatever is buffered; a message that never sees its `end` stays
//! buffered until the next `start`.

use crate::core::packet::{Control, Packet, PAYLOAD_LEN};
use crate::error::{ProtocolError, Result};
use crate::utils::crypto::{self, Crypto};
use std::mem;

/// Length byte plus tag byte
pub const HEADER_LEN: usize = 2;

/// Largest payload the length byte can describe
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// A decoded message envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub tag: u8,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Header, payload and non-zero random filler to a multiple of 16 bytes
    pub fn seal(tag: u8, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(ProtocolError::OversizedMessage(payload.len()));
        }
        let used = HEADER_LEN + payload.len();
        let padded = used.div_ceil(PAYLOAD_LEN) * PAYLOAD_LEN;

        let mut out = Vec::with_capacity(padded);
        out.push(payload.len() as u8);
        out.push(tag);
        out.extend_from_slice(payload);
        out.extend_from_slice(&crypto::random_nonzero(padded - used)?);
        Ok(out)
    }

    /// Parse a reassembled (and decrypted) buffer, dropping the filler
    pub fn open(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(ProtocolError::MalformedEnvelope);
        }
        let len = usize::from(buf[0]);
        let body = &buf[HEADER_LEN..];
        if body.len() < len {
            return Err(ProtocolError::MalformedEnvelope);
        }
        Ok(Self {
            tag: buf[1],
            payload: body[..len].to_vec(),
        })
    }
}

/// Build the packets for one outbound message
pub fn fragment(tag: u8, payload: &[u8], crypto: Option<&Crypto>) -> Result<Vec<Packet>> {
    let envelope = Envelope::seal(tag, payload)?;
    match crypto {
        Some(crypto) => Ok(slice(&crypto.encrypt(&envelope)?, true)),
        None => Ok(slice(&envelope, false)),
    }
}

/// Cut `buf` into packets, flagging the first and last
pub fn slice(buf: &[u8], encrypted: bool) -> Vec<Packet> {
    let count = buf.chunks(PAYLOAD_LEN).len();
    buf.chunks(PAYLOAD_LEN)
        .enumerate()
        .map(|(i, chunk)| {
            let mut payload = [0u8; PAYLOAD_LEN];
            payload[..chunk.len()].copy_from_slice(chunk);

            let mut control = Control::default();
            if i == 0 {
                control.insert(Control::START);
            }
            if i + 1 == count {
                control.insert(Control::END);
                if encrypted {
                    control.insert(Control::ENCRYPTED);
                }
            }
            Packet::new(payload, control)
        })
        .collect()
}

/// Reassembly state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReassemblyState {
    #[default]
    Idle,
    Receiving,
}

/// A complete inbound message, possibly still encrypted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    pub bytes: Vec<u8>,
    pub encrypted: bool,
}

/// Accumulates inbound fragments into messages
#[derive(Debug, Default)]
pub struct Reassembler {
    buffer: Vec<u8>,
    state: ReassemblyState,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReassemblyState {
        self.state
    }

    /// Bytes accumulated since the last `start`
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one packet; returns the message when its `end` arrives
    pub fn push(&mut self, packet: &Packet) -> Option<Reassembled> {
        if packet.control.is_start() {
            self.buffer.clear();
            self.state = ReassemblyState::Receiving;
        }
        self.buffer.extend_from_slice(&packet.payload);

        if packet.control.is_end() {
            self.state = ReassemblyState::Idle;
            return Some(Reassembled {
                bytes: mem::take(&mut self.buffer),
                encrypted: packet.control.is_encrypted(),
            });
        }
        None
    }

    /// Drop any partial message
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = ReassemblyState::Idle;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_forty_byte_message_makes_three_packets() {
        let payload: Vec<u8> = (0..40).collect();
        let packets = fragment(9, &payload, None).unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].control.bits(), Control::START);
        assert_eq!(packets[1].control.bits(), 0);
        assert_eq!(packets[2].control.bits(), Control::END);

        let mut r = Reassembler::new();
        assert!(r.push(&packets[0]).is_none());
        assert_eq!(r.state(), ReassemblyState::Receiving);
        assert!(r.push(&packets[1]).is_none());
        let done = r.push(&packets[2]).unwrap();
        assert_eq!(r.state(), ReassemblyState::Idle);
        assert!(!done.encrypted);

        let env = Envelope::open(&done.bytes).unwrap();
        assert_eq!(env.tag, 9);
        assert_eq!(env.payload, payload);
    }

    #[test]
    fn test_single_packet_message_has_both_flags() {
        let packets = fragment(1, b"hi", None).unwrap();
        assert_eq!(packets.len(), 1);
        assert!(packets[0].control.is_start());
        assert!(packets[0].control.is_end());
    }

    #[test]
    fn test_padding_is_random_and_nonzero() {
        let env = Envelope::seal(0, &[]).unwrap();
        assert_eq!(env.len(), PAYLOAD_LEN);
        assert_eq!(&env[..2], &[0, 0]);
        assert!(env[2..].iter().all(|b| *b != 0));
    }

    #[test]
    fn test_exact_multiple_has_no_filler() {
        let env = Envelope::seal(3, &[7u8; 14]).unwrap();
        assert_eq!(env.len(), 16);
    }

    #[test]
    fn test_encrypted_flag_only_on_last() {
        let crypto = Crypto::new(&[5u8; 16]);
        let packets = fragment(2, &[1u8; 20], Some(&crypto)).unwrap();
        // IV block + two envelope blocks
        assert_eq!(packets.len(), 3);
        assert!(!packets[0].control.is_encrypted());
        assert!(!packets[1].control.is_encrypted());
        assert!(packets[2].control.is_encrypted());

        let mut r = Reassembler::new();
        let done = packets.iter().find_map(|p| r.push(p)).unwrap();
        assert!(done.encrypted);
        let env = Envelope::open(&crypto.decrypt(&done.bytes).unwrap()).unwrap();
        assert_eq!(env.payload, vec![1u8; 20]);
    }

    #[test]
    fn test_oversized_payload() {
        assert!(matches!(
            fragment(0, &[0u8; 256], None),
            Err(ProtocolError::OversizedMessage(256))
        ));
        assert!(fragment(0, &[0u8; 255], None).is_ok());
    }

    #[test]
    fn test_start_discards_partial_message() {
        let first = fragment(1, &[1u8; 40], None).unwrap();
        let second = fragment(2, b"ok", None).unwrap();

        let mut r = Reassembler::new();
        r.push(&first[0]);
        let done = r.push(&second[0]).unwrap();
        assert_eq!(Envelope::open(&done.bytes).unwrap().payload, b"ok");
    }

    #[test]
    fn test_stray_fragment_is_appended() {
        let packets = fragment(1, &[4u8; 20], None).unwrap();
        let mut r = Reassembler::new();
        // no start seen; the tail is appended to the empty buffer
        let done = r.push(&packets[1]).unwrap();
        assert_eq!(done.bytes.len(), PAYLOAD_LEN);
    }

    #[test]
    fn test_malformed_envelope() {
        assert!(matches!(
            Envelope::open(&[5, 1, 0, 0]),
            Err(ProtocolError::MalformedEnvelope)
        ));
        assert!(matches!(
            Envelope::open(&[0]),
            Err(ProtocolError::MalformedEnvelope)
        ));
    }
}
