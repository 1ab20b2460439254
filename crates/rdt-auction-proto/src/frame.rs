use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Sequence byte (0 or 1) followed by the type flag.
pub const HEADER_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame of {0} bytes is shorter than the {HEADER_LEN}-byte header")]
    Truncated(usize),
    #[error("invalid sequence bit {0}")]
    InvalidSequence(u8),
    #[error("invalid frame type {0}")]
    InvalidKind(u8),
}

/// The alternating bit of stop-and-wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeqBit {
    #[default]
    Zero,
    One,
}

impl SeqBit {
    pub fn flipped(self) -> Self {
        match self {
            SeqBit::Zero => SeqBit::One,
            SeqBit::One => SeqBit::Zero,
        }
    }

    pub fn flip(&mut self) {
        *self = self.flipped();
    }

    pub fn as_u8(self) -> u8 {
        match self {
            SeqBit::Zero => 0,
            SeqBit::One => 1,
        }
    }
}

impl TryFrom<u8> for SeqBit {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SeqBit::Zero),
            1 => Ok(SeqBit::One),
            other => Err(FrameError::InvalidSequence(other)),
        }
    }
}

impl fmt::Display for SeqBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Type flag carried in the second header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Control = 0,
    Data = 1,
}

impl TryFrom<u8> for FrameKind {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FrameKind::Control),
            1 => Ok(FrameKind::Data),
            other => Err(FrameError::InvalidKind(other)),
        }
    }
}

/// One datagram of the transfer protocol.
///
/// Acknowledgments reuse the header shape: a control frame with an empty
/// payload whose sequence bit names the frame being acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: SeqBit,
    pub kind: FrameKind,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(seq: SeqBit, kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            seq,
            kind,
            payload: payload.into(),
        }
    }

    pub fn data(seq: SeqBit, chunk: Bytes) -> Self {
        Self::new(seq, FrameKind::Data, chunk)
    }

    pub fn control(seq: SeqBit, text: &str) -> Self {
        Self::new(seq, FrameKind::Control, Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Create a pure acknowledgment for `seq`.
    pub fn ack(seq: SeqBit) -> Self {
        Self::new(seq, FrameKind::Control, Bytes::new())
    }

    pub fn is_ack(&self) -> bool {
        self.kind == FrameKind::Control && self.payload.is_empty()
    }

    pub fn is_ack_for(&self, seq: SeqBit) -> bool {
        self.is_ack() && self.seq == seq
    }

    /// Total length on the wire, header included.
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.put_u8(self.seq.as_u8());
        buf.put_u8(self.kind as u8);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::Truncated(bytes.len()));
        }
        let seq = SeqBit::try_from(bytes[0])?;
        let kind = FrameKind::try_from(bytes[1])?;
        Ok(Self {
            seq,
            kind,
            payload: Bytes::copy_from_slice(&bytes[HEADER_LEN..]),
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FrameKind::Control if self.payload.is_empty() => write!(f, "ack seq={}", self.seq),
            FrameKind::Control => write!(
                f,
                "control seq={} '{}'",
                self.seq,
                String::from_utf8_lossy(&self.payload)
            ),
            FrameKind::Data => write!(f, "data seq={} ({} bytes)", self.seq, self.payload.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_frame_layout() {
        let frame = Frame::data(SeqBit::One, Bytes::from_static(b"abc"));
        assert_eq!(&frame.encode()[..], &[1, 1, b'a', b'b', b'c']);
    }

    #[test]
    fn ack_is_two_bytes() {
        let ack = Frame::ack(SeqBit::Zero);
        assert_eq!(&ack.encode()[..], &[0, 0]);
        assert_eq!(ack.wire_len(), HEADER_LEN);
        assert!(ack.is_ack_for(SeqBit::Zero));
        assert!(!ack.is_ack_for(SeqBit::One));
    }

    #[test]
    fn decode_rejects_short_input() {
        assert_eq!(Frame::decode(&[]), Err(FrameError::Truncated(0)));
        assert_eq!(Frame::decode(&[1]), Err(FrameError::Truncated(1)));
    }

    #[test]
    fn decode_rejects_unknown_header_values() {
        assert_eq!(Frame::decode(&[2, 0]), Err(FrameError::InvalidSequence(2)));
        assert_eq!(Frame::decode(&[0, 7]), Err(FrameError::InvalidKind(7)));
    }

    #[test]
    fn header_only_control_decodes_as_ack() {
        let frame = Frame::decode(&[1, 0]).unwrap();
        assert_eq!(frame, Frame::ack(SeqBit::One));
    }

    #[test]
    fn seq_bit_alternates() {
        let mut bit = SeqBit::default();
        bit.flip();
        assert_eq!(bit, SeqBit::One);
        bit.flip();
        assert_eq!(bit, SeqBit::Zero);
    }
}
