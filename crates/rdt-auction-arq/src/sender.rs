use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use rdt_auction_proto::config::RECV_BUFFER_LEN;
use rdt_auction_proto::{
    ArqConfig, ArqEndpoint, ControlMessage, Frame, HEADER_LEN, LinkContext, SeqBit,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::TransferError;
use crate::loss::LossSimulator;

/// Largest chunk whose frame still fits the receiver's datagram buffer.
pub const MAX_CHUNK_SIZE: usize = RECV_BUFFER_LEN - HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Start,
    Data { offset: usize },
    Fin,
    Done,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SenderStats {
    pub frames_sent: u64,
    pub retransmissions: u64,
    pub acks_dropped: u64,
    /// Acks with the wrong bit or from the wrong address.
    pub stale_acks: u64,
    pub bytes_acked: usize,
}

/// Stop-and-wait sender: `start <size>`, the payload in chunks, then `fin`,
/// each frame retransmitted on every timeout until its ack arrives.
pub struct ArqSender {
    peer: SocketAddr,
    payload: Bytes,
    chunk_size: usize,
    timeout: Duration,
    seq: SeqBit,
    stage: Stage,
    in_flight: Option<Frame>,
    ack_loss: LossSimulator,
    stats: SenderStats,
}

impl ArqSender {
    pub fn new(
        peer: SocketAddr,
        payload: impl Into<Bytes>,
        config: &ArqConfig,
    ) -> Result<Self, TransferError> {
        let payload = payload.into();
        if payload.is_empty() {
            return Err(TransferError::EmptyPayload);
        }
        if config.chunk_size == 0 {
            return Err(TransferError::ZeroChunkSize);
        }
        if config.chunk_size > MAX_CHUNK_SIZE {
            return Err(TransferError::ChunkTooLarge {
                chunk_size: config.chunk_size,
                max: MAX_CHUNK_SIZE,
            });
        }
        Ok(Self {
            peer,
            payload,
            chunk_size: config.chunk_size,
            timeout: config.timeout(),
            seq: SeqBit::Zero,
            stage: Stage::Start,
            in_flight: None,
            ack_loss: LossSimulator::new(config.loss_rate),
            stats: SenderStats::default(),
        })
    }

    /// Replace the ack loss simulation, e.g. with a seeded one.
    pub fn with_ack_loss(mut self, ack_loss: LossSimulator) -> Self {
        self.ack_loss = ack_loss;
        self
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sequence bit of the frame currently awaiting its ack.
    pub fn seq(&self) -> SeqBit {
        self.seq
    }

    pub fn in_flight(&self) -> Option<&Frame> {
        self.in_flight.as_ref()
    }

    pub fn total_size(&self) -> usize {
        self.payload.len()
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    fn chunk_end(&self, offset: usize) -> usize {
        (offset + self.chunk_size).min(self.payload.len())
    }

    fn current_frame(&self) -> Option<Frame> {
        match self.stage {
            Stage::Start => Some(
                ControlMessage::Start {
                    total_size: self.payload.len() as u64,
                }
                .to_frame(self.seq),
            ),
            Stage::Data { offset } => Some(Frame::data(
                self.seq,
                self.payload.slice(offset..self.chunk_end(offset)),
            )),
            Stage::Fin => Some(ControlMessage::Fin.to_frame(self.seq)),
            Stage::Done => None,
        }
    }

    fn transmit(&mut self, ctx: &mut dyn LinkContext) {
        let Some(frame) = self.current_frame() else {
            return;
        };
        match self.stage {
            Stage::Data { offset } => info!(
                "Sending data seq {}: {} / {}",
                self.seq,
                self.chunk_end(offset),
                self.payload.len()
            ),
            _ => info!(
                "Sending control seq {}: {}",
                self.seq,
                String::from_utf8_lossy(&frame.payload)
            ),
        }
        ctx.send_frame(self.peer, frame.clone());
        ctx.start_timer(self.timeout);
        self.in_flight = Some(frame);
        self.stats.frames_sent += 1;
    }

    fn advance(&mut self) {
        self.stage = match self.stage {
            Stage::Start => Stage::Data { offset: 0 },
            Stage::Data { offset } => {
                let end = self.chunk_end(offset);
                self.stats.bytes_acked += end - offset;
                if end < self.payload.len() {
                    Stage::Data { offset: end }
                } else {
                    Stage::Fin
                }
            }
            Stage::Fin | Stage::Done => Stage::Done,
        };
        if self.stage == Stage::Done {
            self.in_flight = None;
        } else {
            self.seq.flip();
        }
    }
}

impl ArqEndpoint for ArqSender {
    fn on_start(&mut self, ctx: &mut dyn LinkContext) {
        self.transmit(ctx);
    }

    fn on_frame(&mut self, ctx: &mut dyn LinkContext, from: SocketAddr, frame: Frame) {
        if self.stage == Stage::Done {
            return;
        }
        if from != self.peer || !frame.is_ack_for(self.seq) {
            debug!("Ignoring {} from {} while waiting for ack {}", frame, from, self.seq);
            self.stats.stale_acks += 1;
            return;
        }
        // The fin ack is exempt: the receiver stops listening once it has sent it.
        if self.stage != Stage::Fin && self.ack_loss.should_drop() {
            info!("Ack dropped: {}", self.seq);
            self.stats.acks_dropped += 1;
            return;
        }

        info!("Ack received: {}", self.seq);
        ctx.cancel_timer();
        self.advance();
        self.transmit(ctx);
    }

    fn on_timeout(&mut self, ctx: &mut dyn LinkContext) {
        let Some(frame) = self.in_flight.clone() else {
            return;
        };
        info!("Msg re-sent: {}", self.seq);
        ctx.send_frame(self.peer, frame);
        ctx.start_timer(self.timeout);
        self.stats.frames_sent += 1;
        self.stats.retransmissions += 1;
    }

    fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingContext;
    use rdt_auction_proto::FrameKind;

    fn peer() -> SocketAddr {
        "10.0.0.7:5000".parse().unwrap()
    }

    fn config(chunk_size: usize) -> ArqConfig {
        ArqConfig {
            chunk_size,
            ..ArqConfig::default()
        }
    }

    fn started(payload: &'static [u8], chunk_size: usize) -> (ArqSender, RecordingContext) {
        let mut sender = ArqSender::new(peer(), payload, &config(chunk_size)).unwrap();
        let mut ctx = RecordingContext::default();
        sender.on_start(&mut ctx);
        (sender, ctx)
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(matches!(
            ArqSender::new(peer(), Bytes::new(), &ArqConfig::default()),
            Err(TransferError::EmptyPayload)
        ));
    }

    #[test]
    fn chunk_must_fit_one_datagram() {
        assert!(ArqSender::new(peer(), &b"abc"[..], &config(MAX_CHUNK_SIZE)).is_ok());
        assert!(matches!(
            ArqSender::new(peer(), &b"abc"[..], &config(MAX_CHUNK_SIZE + 1)),
            Err(TransferError::ChunkTooLarge { chunk_size: 2047, max: 2046 })
        ));
        assert!(matches!(
            ArqSender::new(peer(), &b"abc"[..], &config(0)),
            Err(TransferError::ZeroChunkSize)
        ));
    }

    #[test]
    fn opens_with_start_frame() {
        let (_, ctx) = started(b"hello", 2000);
        let (to, frame) = &ctx.sent[0];
        assert_eq!(*to, peer());
        assert_eq!(&frame.encode()[..], b"\x00\x00start 5");
        assert_eq!(ctx.timer, Some(Duration::from_millis(2000)));
    }

    #[test]
    fn walks_through_chunks_then_fin() {
        let (mut sender, mut ctx) = started(b"abcdefg", 3);
        for bit in [SeqBit::Zero, SeqBit::One, SeqBit::Zero, SeqBit::One, SeqBit::Zero] {
            sender.on_frame(&mut ctx, peer(), Frame::ack(bit));
        }
        let payloads: Vec<_> = ctx
            .sent
            .iter()
            .map(|(_, f)| (f.seq.as_u8(), f.kind, f.payload.to_vec()))
            .collect();
        assert_eq!(
            payloads,
            vec![
                (0, FrameKind::Control, b"start 7".to_vec()),
                (1, FrameKind::Data, b"abc".to_vec()),
                (0, FrameKind::Data, b"def".to_vec()),
                (1, FrameKind::Data, b"g".to_vec()),
                (0, FrameKind::Control, b"fin".to_vec()),
            ]
        );
        assert!(sender.is_finished());
        assert_eq!(sender.stats().bytes_acked, 7);
        assert_eq!(ctx.timer, None);
    }

    #[test]
    fn stale_or_foreign_acks_do_not_advance() {
        let (mut sender, mut ctx) = started(b"abc", 2000);
        sender.on_frame(&mut ctx, peer(), Frame::ack(SeqBit::One));
        sender.on_frame(&mut ctx, "10.0.0.8:5000".parse().unwrap(), Frame::ack(SeqBit::Zero));
        sender.on_frame(&mut ctx, peer(), Frame::control(SeqBit::Zero, "fin"));

        assert_eq!(sender.seq(), SeqBit::Zero);
        assert_eq!(ctx.sent.len(), 1);
        assert_eq!(sender.stats().stale_acks, 3);
        assert!(ctx.timer.is_some());

        sender.on_timeout(&mut ctx);
        assert_eq!(ctx.sent.len(), 2);
        assert_eq!(ctx.sent[0], ctx.sent[1]);
        assert_eq!(sender.stats().retransmissions, 1);
    }

    #[test]
    fn dropped_ack_keeps_waiting() {
        let (sender, mut ctx) = started(b"abc", 2000);
        let mut sender = sender.with_ack_loss(LossSimulator::seeded(Some(1.0), 1));
        sender.on_frame(&mut ctx, peer(), Frame::ack(SeqBit::Zero));
        assert_eq!(sender.seq(), SeqBit::Zero);
        assert_eq!(sender.stats().acks_dropped, 1);
        assert_eq!(ctx.sent.len(), 1);
        assert!(ctx.timer.is_some());
    }

    #[test]
    fn fin_ack_is_never_dropped() {
        let (mut sender, mut ctx) = started(b"ab", 2000);
        sender.on_frame(&mut ctx, peer(), Frame::ack(SeqBit::Zero));
        sender.on_frame(&mut ctx, peer(), Frame::ack(SeqBit::One));
        let mut sender = sender.with_ack_loss(LossSimulator::seeded(Some(1.0), 1));
        sender.on_frame(&mut ctx, peer(), Frame::ack(SeqBit::Zero));
        assert!(sender.is_finished());
    }
}
