use std::fmt;

use thiserror::Error;

use crate::frame::{Frame, FrameKind, SeqBit};

pub const START: &str = "start";
pub const FIN: &str = "fin";

/// Payload of a control frame that is not an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Opens a transfer and announces the payload size in bytes.
    Start { total_size: u64 },
    /// Terminates a transfer.
    Fin,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("not a control frame")]
    NotControl,
    #[error("unknown control payload {0:?}")]
    UnknownControl(String),
}

impl ControlMessage {
    pub fn to_frame(self, seq: SeqBit) -> Frame {
        Frame::control(seq, &self.to_string())
    }

    pub fn from_frame(frame: &Frame) -> Result<Self, ControlError> {
        if frame.kind != FrameKind::Control {
            return Err(ControlError::NotControl);
        }
        let text = std::str::from_utf8(&frame.payload).map_err(|_| {
            ControlError::UnknownControl(String::from_utf8_lossy(&frame.payload).into_owned())
        })?;
        Self::parse(text)
    }

    pub fn parse(text: &str) -> Result<Self, ControlError> {
        let unknown = || ControlError::UnknownControl(text.to_string());
        let mut words = text.split_whitespace();
        match words.next() {
            Some(FIN) if words.next().is_none() => Ok(ControlMessage::Fin),
            Some(START) => {
                let total_size = words
                    .next()
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(unknown)?;
                if words.next().is_some() {
                    return Err(unknown());
                }
                Ok(ControlMessage::Start { total_size })
            }
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for ControlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMessage::Start { total_size } => write!(f, "{START} {total_size}"),
            ControlMessage::Fin => f.write_str(FIN),
        }
    }
}
