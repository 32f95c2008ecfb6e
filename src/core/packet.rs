//! Radio packet: one fixed-size characteristic write.
//!
//! ```text
//! [Payload(16)] [Control(1)]
//! ```
//!
//! Control bits: bit0 start of message, bit1 end of message, bit2 payload
//! of the whole message is encrypted. Remaining bits are preserved but ignored.

use crate::error::{ProtocolError, Result};

/// Payload bytes per packet
pub const PAYLOAD_LEN: usize = 16;

/// Payload plus control byte
pub const PACKET_LEN: usize = PAYLOAD_LEN + 1;

/// Control byte of a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Control(u8);

impl Control {
    /// First packet of a message
    pub const START: u8 = 1 << 0;
    /// Last packet of a message
    pub const END: u8 = 1 << 1;
    /// Message body is encrypted
    pub const ENCRYPTED: u8 = 1 << 2;

    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    pub fn insert(&mut self, flag: u8) {
        self.0 |= flag;
    }

    pub fn is_start(self) -> bool {
        self.contains(Self::START)
    }

    pub fn is_end(self) -> bool {
        self.contains(Self::END)
    }

    pub fn is_encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED)
    }
}

/// One 17-byte wire packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub payload: [u8; PAYLOAD_LEN],
    pub control: Control,
}

impl Packet {
    pub fn new(payload: [u8; PAYLOAD_LEN], control: Control) -> Self {
        Self { payload, control }
    }

    pub fn to_bytes(&self) -> [u8; PACKET_LEN] {
        let mut out = [0u8; PACKET_LEN];
        out[..PAYLOAD_LEN].copy_from_slice(&self.payload);
        out[PAYLOAD_LEN] = self.control.bits();
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != PACKET_LEN {
            return Err(ProtocolError::InvalidPacket(buf.len()));
        }
        let mut payload = [0u8; PAYLOAD_LEN];
        payload.copy_from_slice(&buf[..PAYLOAD_LEN]);
        Ok(Self {
            payload,
            control: Control::from_bits(buf[PAYLOAD_LEN]),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_layout() {
        let mut control = Control::default();
        control.insert(Control::START);
        control.insert(Control::ENCRYPTED);
        let packet = Packet::new([0xAB; PAYLOAD_LEN], control);

        let bytes = packet.to_bytes();
        assert_eq!(bytes.len(), 17);
        assert_eq!(bytes[16], 0b101);
        assert_eq!(Packet::from_bytes(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(matches!(
            Packet::from_bytes(&[0u8; 16]),
            Err(ProtocolError::InvalidPacket(16))
        ));
        assert!(matches!(
            Packet::from_bytes(&[0u8; 20]),
            Err(ProtocolError::InvalidPacket(20))
        ));
    }

    #[test]
    fn test_unknown_control_bits_ignored() {
        let c = Control::from_bits(0b1111_1010);
        assert!(!c.is_start());
        assert!(c.is_end());
        assert!(!c.is_encrypted());
    }
}
