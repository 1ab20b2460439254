use std::net::{IpAddr, SocketAddr};

use bytes::{Bytes, BytesMut};
use rdt_auction_proto::{
    ArqConfig, ArqEndpoint, ControlMessage, Frame, FrameKind, LinkContext, SeqBit,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::loss::LossSimulator;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReceiverStats {
    pub frames_accepted: u64,
    /// Frames carrying the previous bit, answered with a repeated ack.
    pub duplicates: u64,
    /// Frames discarded by the loss simulation.
    pub frames_dropped: u64,
    /// Frames from an unexpected address or with an unusable control payload.
    pub frames_ignored: u64,
}

/// Stop-and-wait receiver reassembling one payload.
pub struct ArqReceiver {
    expected_peer: Option<IpAddr>,
    peer: Option<SocketAddr>,
    expected: SeqBit,
    buffer: BytesMut,
    declared_size: Option<u64>,
    frame_loss: LossSimulator,
    first_accepted: bool,
    finished: bool,
    stats: ReceiverStats,
}

impl ArqReceiver {
    /// `expected_peer` restricts the session to frames from that host; with
    /// `None` the first frame's sender is accepted.
    pub fn new(expected_peer: Option<IpAddr>, config: &ArqConfig) -> Self {
        Self {
            expected_peer,
            peer: None,
            expected: SeqBit::Zero,
            buffer: BytesMut::new(),
            declared_size: None,
            frame_loss: LossSimulator::new(config.loss_rate),
            first_accepted: false,
            finished: false,
            stats: ReceiverStats::default(),
        }
    }

    pub fn with_frame_loss(mut self, frame_loss: LossSimulator) -> Self {
        self.frame_loss = frame_loss;
        self
    }

    pub fn expected_seq(&self) -> SeqBit {
        self.expected
    }

    pub fn declared_size(&self) -> Option<u64> {
        self.declared_size
    }

    pub fn bytes_received(&self) -> usize {
        self.buffer.len()
    }

    pub fn payload(&self) -> &[u8] {
        &self.buffer
    }

    /// Address the session's frames came from, once known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    pub fn into_payload(self) -> Bytes {
        self.buffer.freeze()
    }

    fn ack(&self, ctx: &mut dyn LinkContext, to: SocketAddr, seq: SeqBit) {
        ctx.send_frame(to, Frame::ack(seq));
    }

    fn accept(&mut self, ctx: &mut dyn LinkContext, from: SocketAddr, frame: Frame) {
        match frame.kind {
            FrameKind::Control => match ControlMessage::from_frame(&frame) {
                Ok(ControlMessage::Start { total_size }) => {
                    info!("Msg received: {}", frame.seq);
                    self.declared_size = Some(total_size);
                    self.ack(ctx, from, frame.seq);
                    info!("Ack sent: {}", frame.seq);
                    self.expected.flip();
                }
                Ok(ControlMessage::Fin) => {
                    info!("Msg received: {}", frame.seq);
                    if let Some(total) = self.declared_size
                        && total != self.buffer.len() as u64
                    {
                        warn!(
                            "Transfer ended with {} bytes but {} were announced",
                            self.buffer.len(),
                            total
                        );
                    }
                    self.ack(ctx, from, frame.seq);
                    info!("Ack sent: {}", frame.seq);
                    self.finished = true;
                }
                Err(err) => {
                    debug!("Discarding control frame from {}: {}", from, err);
                    self.stats.frames_ignored += 1;
                    return;
                }
            },
            FrameKind::Data => {
                info!("Msg received: {}", frame.seq);
                self.buffer.extend_from_slice(&frame.payload);
                self.ack(ctx, from, frame.seq);
                info!("Ack sent: {}", frame.seq);
                match self.declared_size {
                    Some(total) => info!(
                        "Received data seq {}: {} / {}",
                        frame.seq,
                        self.buffer.len(),
                        total
                    ),
                    None => info!("Received data seq {}: {} bytes", frame.seq, self.buffer.len()),
                }
                self.expected.flip();
            }
        }
        self.stats.frames_accepted += 1;
    }
}

impl ArqEndpoint for ArqReceiver {
    fn on_frame(&mut self, ctx: &mut dyn LinkContext, from: SocketAddr, frame: Frame) {
        if let Some(ip) = self.expected_peer
            && from.ip() != ip
        {
            debug!("Ignoring {} from unexpected host {}", frame, from);
            self.stats.frames_ignored += 1;
            return;
        }
        if let Some(peer) = self.peer
            && from != peer
        {
            debug!("Ignoring {} from {}; session belongs to {}", frame, from, peer);
            self.stats.frames_ignored += 1;
            return;
        }
        if self.first_accepted && self.frame_loss.should_drop() {
            info!("Pkt dropped: {}", frame.seq);
            self.stats.frames_dropped += 1;
            return;
        }
        if !self.first_accepted {
            self.first_accepted = true;
            self.peer = Some(from);
        }

        if self.finished {
            // Our fin ack was lost; the sender is still repeating the fin.
            self.ack(ctx, from, frame.seq);
            info!("Ack re-sent: {}", frame.seq);
            return;
        }
        if frame.seq != self.expected {
            info!(
                "Msg received with mismatched sequence number {}. Expecting {}",
                frame.seq, self.expected
            );
            self.stats.duplicates += 1;
            let previous = self.expected.flipped();
            self.ack(ctx, from, previous);
            info!("Ack re-sent: {}", previous);
            return;
        }
        self.accept(ctx, from, frame);
    }

    fn on_timeout(&mut self, _ctx: &mut dyn LinkContext) {}

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingContext;

    fn seller() -> SocketAddr {
        "10.0.0.2:41000".parse().unwrap()
    }

    fn start(total_size: u64) -> Frame {
        ControlMessage::Start { total_size }.to_frame(SeqBit::Zero)
    }

    fn receiver() -> ArqReceiver {
        ArqReceiver::new(Some(seller().ip()), &ArqConfig::default())
    }

    fn acks(ctx: &RecordingContext) -> Vec<u8> {
        ctx.sent
            .iter()
            .inspect(|(to, frame)| {
                assert_eq!(*to, seller());
                assert!(frame.is_ack());
            })
            .map(|(_, frame)| frame.seq.as_u8())
            .collect()
    }

    #[test]
    fn assembles_payload_in_order() {
        let mut rx = receiver();
        let mut ctx = RecordingContext::default();
        rx.on_frame(&mut ctx, seller(), start(5));
        rx.on_frame(&mut ctx, seller(), Frame::data(SeqBit::One, "hel".into()));
        rx.on_frame(&mut ctx, seller(), Frame::data(SeqBit::Zero, "lo".into()));
        assert!(!rx.is_finished());
        rx.on_frame(&mut ctx, seller(), ControlMessage::Fin.to_frame(SeqBit::One));

        assert!(rx.is_finished());
        assert_eq!(acks(&ctx), vec![0, 1, 0, 1]);
        assert_eq!(rx.declared_size(), Some(5));
        assert_eq!(rx.peer(), Some(seller()));
        assert_eq!(rx.into_payload(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn replayed_frame_is_reacked_without_side_effects() {
        let mut rx = receiver();
        let mut ctx = RecordingContext::default();
        let data = Frame::data(SeqBit::One, Bytes::from_static(b"abc"));
        rx.on_frame(&mut ctx, seller(), start(6));
        rx.on_frame(&mut ctx, seller(), data.clone());
        rx.on_frame(&mut ctx, seller(), data);

        assert_eq!(acks(&ctx), vec![0, 1, 1]);
        assert_eq!(rx.payload(), b"abc");
        assert_eq!(rx.bytes_received(), 3);
        assert_eq!(rx.expected_seq(), SeqBit::Zero);
        assert_eq!(rx.stats().duplicates, 1);
    }

    #[test]
    fn repeated_start_is_reacked() {
        let mut rx = receiver();
        let mut ctx = RecordingContext::default();
        let start = start(6);
        rx.on_frame(&mut ctx, seller(), start.clone());
        rx.on_frame(&mut ctx, seller(), start);
        assert_eq!(acks(&ctx), vec![0, 0]);
        assert_eq!(rx.expected_seq(), SeqBit::One);
    }

    #[test]
    fn frames_from_other_hosts_are_ignored() {
        let mut rx = receiver();
        let mut ctx = RecordingContext::default();
        let stranger: SocketAddr = "10.0.0.9:41000".parse().unwrap();
        rx.on_frame(&mut ctx, stranger, start(1));
        assert!(ctx.sent.is_empty());
        assert_eq!(rx.declared_size(), None);
        assert_eq!(rx.stats().frames_ignored, 1);
    }

    #[test]
    fn open_receiver_sticks_to_first_sender() {
        let mut rx = ArqReceiver::new(None, &ArqConfig::default());
        let mut ctx = RecordingContext::default();
        let intruder: SocketAddr = "10.0.0.66:41000".parse().unwrap();
        rx.on_frame(&mut ctx, seller(), start(3));
        rx.on_frame(&mut ctx, intruder, Frame::data(SeqBit::One, "EVL".into()));

        assert_eq!(rx.peer(), Some(seller()));
        assert_eq!(acks(&ctx), vec![0]);
        assert_eq!(rx.bytes_received(), 0);
        assert_eq!(rx.expected_seq(), SeqBit::One);
        assert_eq!(rx.stats().frames_ignored, 1);

        rx.on_frame(&mut ctx, seller(), Frame::data(SeqBit::One, "abc".into()));
        assert_eq!(rx.payload(), b"abc");
    }

    #[test]
    fn first_frame_is_never_dropped() {
        let mut rx = receiver().with_frame_loss(LossSimulator::seeded(Some(1.0), 9));
        let mut ctx = RecordingContext::default();
        rx.on_frame(&mut ctx, seller(), start(2));
        rx.on_frame(&mut ctx, seller(), Frame::data(SeqBit::One, "hi".into()));
        assert_eq!(acks(&ctx), vec![0]);
        assert_eq!(rx.stats().frames_dropped, 1);
        assert_eq!(rx.bytes_received(), 0);
    }

    #[test]
    fn unknown_control_payload_gets_no_reply() {
        let mut rx = receiver();
        let mut ctx = RecordingContext::default();
        rx.on_frame(&mut ctx, seller(), Frame::control(SeqBit::Zero, "hello"));
        assert!(ctx.sent.is_empty());
        assert_eq!(rx.expected_seq(), SeqBit::Zero);
    }

    #[test]
    fn repeated_fin_after_finish_is_acked() {
        let mut rx = receiver();
        let mut ctx = RecordingContext::default();
        rx.on_frame(&mut ctx, seller(), start(1));
        rx.on_frame(&mut ctx, seller(), Frame::data(SeqBit::One, "x".into()));
        rx.on_frame(&mut ctx, seller(), ControlMessage::Fin.to_frame(SeqBit::Zero));
        rx.on_frame(&mut ctx, seller(), ControlMessage::Fin.to_frame(SeqBit::Zero));
        assert_eq!(acks(&ctx), vec![0, 1, 0, 0]);
        assert_eq!(rx.payload(), b"x");
    }
}
