use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length in bytes of every application message and packet payload.
pub const MESSAGE_LEN: usize = 20;

/// Value carried in header fields that are not used by a packet
/// (e.g. the ack number of a data packet).
pub const NOT_IN_USE: u32 = u32::MAX;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("message of {len} bytes exceeds the {MESSAGE_LEN}-byte payload")]
    TooLong { len: usize },
}

/// A fixed-size unit of application data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Message {
    pub data: [u8; MESSAGE_LEN],
}

impl Message {
    pub fn new(data: [u8; MESSAGE_LEN]) -> Self {
        Self { data }
    }

    /// Build a message from up to `MESSAGE_LEN` bytes, zero-padding the rest.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessageError> {
        if bytes.len() > MESSAGE_LEN {
            return Err(MessageError::TooLong { len: bytes.len() });
        }
        let mut data = [0u8; MESSAGE_LEN];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self { data })
    }

    /// A message made of one repeated byte, as produced by the traffic generator.
    pub fn filled(byte: u8) -> Self {
        Self {
            data: [byte; MESSAGE_LEN],
        }
    }

    /// Payload with trailing zero padding removed.
    pub fn trimmed(&self) -> &[u8] {
        let end = self
            .data
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |pos| pos + 1);
        &self.data[..end]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SrHeader {
    /// Sequence number in `[0, seq_space)`
    pub seq_num: u32,
    /// Acknowledged sequence number, or `NOT_IN_USE` on data packets
    pub ack_num: u32,
    /// Sum of the header fields and payload bytes, filled in by the sender
    pub checksum: u32,
}

impl SrHeader {
    pub fn new(seq: u32, ack: u32) -> Self {
        Self {
            seq_num: seq,
            ack_num: ack,
            checksum: 0,
        }
    }

    pub fn ack(&self) -> Option<u32> {
        (self.ack_num != NOT_IN_USE).then_some(self.ack_num)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packet {
    pub header: SrHeader,
    pub payload: Message,
}

impl Packet {
    pub fn new(header: SrHeader, payload: Message) -> Self {
        Self { header, payload }
    }

    /// Data packet carrying `payload`; checksum is left at zero.
    pub fn new_data(seq: u32, payload: Message) -> Self {
        Self::new(SrHeader::new(seq, NOT_IN_USE), payload)
    }

    /// Pure acknowledgment packet with a zero-filled payload.
    pub fn new_ack(seq: u32, ack: u32) -> Self {
        Self::new(SrHeader::new(seq, ack), Message::default())
    }

    pub fn is_ack(&self) -> bool {
        self.header.ack().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_are_zero_padded() {
        let msg = Message::from_bytes(b"hello").unwrap();
        assert_eq!(&msg.data[..5], b"hello");
        assert!(msg.data[5..].iter().all(|b| *b == 0));
        assert_eq!(msg.trimmed(), b"hello");
    }

    #[test]
    fn oversized_messages_are_rejected() {
        let err = Message::from_bytes(&[b'x'; MESSAGE_LEN + 1]).unwrap_err();
        assert_eq!(err, MessageError::TooLong { len: 21 });
    }

    #[test]
    fn data_packets_carry_no_ack() {
        let pkt = Packet::new_data(3, Message::filled(b'a'));
        assert!(!pkt.is_ack());
        assert_eq!(pkt.header.ack(), None);
        assert!(Packet::new_ack(1, 3).is_ack());
    }
}
