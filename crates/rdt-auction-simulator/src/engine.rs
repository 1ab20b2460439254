use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rdt_auction_proto::{ArqEndpoint, Frame, FrameKind, LinkConfig, LinkContext, SeqBit};
use serde::Serialize;
use tracing::debug;

use crate::trace::SimulationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }

    /// The fixed address each node has on the simulated link.
    pub fn addr(&self) -> SocketAddr {
        match self {
            NodeId::Sender => SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 41000),
            NodeId::Receiver => SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 41001),
        }
    }

    fn from_addr(addr: SocketAddr) -> Option<Self> {
        [NodeId::Sender, NodeId::Receiver]
            .into_iter()
            .find(|node| node.addr() == addr)
    }
}

#[derive(Debug)]
enum EventType {
    FrameArrival {
        to: NodeId,
        from: SocketAddr,
        frame: Frame,
    },
    TimerExpiry {
        node: NodeId,
        generation: u64,
    },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on (time, id).
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

enum TimerCommand {
    Start(Duration),
    Cancel,
}

#[derive(Default)]
struct ActionBuffer {
    outgoing: Vec<(SocketAddr, Frame)>,
    timer: Vec<TimerCommand>,
}

struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
}

impl LinkContext for ScopedContext<'_> {
    fn send_frame(&mut self, to: SocketAddr, frame: Frame) {
        self.buffer.outgoing.push((to, frame));
    }

    fn start_timer(&mut self, delay: Duration) {
        self.buffer.timer.push(TimerCommand::Start(delay));
    }

    fn cancel_timer(&mut self) {
        self.buffer.timer.push(TimerCommand::Cancel);
    }
}

/// Discrete-event simulation of one sender and one receiver joined by a
/// lossy link with random latency. Time is in milliseconds.
pub struct Simulator<S: ArqEndpoint, R: ArqEndpoint> {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: LinkConfig,
    rng: StdRng,

    pub sender: S,
    pub receiver: R,

    pub sender_frame_count: u32,
    pub receiver_frame_count: u32,
    pub sender_finished_at: Option<u64>,
    pub receiver_finished_at: Option<u64>,

    // One-shot deterministic drops, consumed by the first matching frame.
    drop_data_once: Vec<SeqBit>,
    drop_control_once: Vec<SeqBit>,
    drop_ack_once: Vec<SeqBit>,

    pub link_events: Vec<LinkEventSummary>,

    /// Bumped on every start or cancel so stale expiry events are skipped.
    timer_generations: HashMap<NodeId, u64>,
}

impl<S: ArqEndpoint, R: ArqEndpoint> Simulator<S, R> {
    pub fn new(config: LinkConfig, sender: S, receiver: R) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            rng,
            sender,
            receiver,
            sender_frame_count: 0,
            receiver_frame_count: 0,
            sender_finished_at: None,
            receiver_finished_at: None,
            drop_data_once: Vec::new(),
            drop_control_once: Vec::new(),
            drop_ack_once: Vec::new(),
            link_events: Vec::new(),
            timer_generations: HashMap::new(),
        }
    }

    /// Drop the first data frame the sender transmits with bit `seq`.
    pub fn add_drop_data_once(&mut self, seq: SeqBit) {
        self.drop_data_once.push(seq);
    }

    /// Drop the first non-ack control frame the sender transmits with bit `seq`.
    pub fn add_drop_control_once(&mut self, seq: SeqBit) {
        self.drop_control_once.push(seq);
    }

    /// Drop the first ack the receiver transmits for bit `seq`.
    pub fn add_drop_ack_once(&mut self, seq: SeqBit) {
        self.drop_ack_once.push(seq);
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    pub fn is_complete(&self) -> bool {
        self.sender.is_finished() && self.receiver.is_finished()
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    fn dispatch(
        &mut self,
        node: NodeId,
        callback: impl FnOnce(&mut S, &mut R, &mut dyn LinkContext),
    ) {
        let mut buffer = ActionBuffer::default();
        {
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
            };
            callback(&mut self.sender, &mut self.receiver, &mut ctx as &mut dyn LinkContext);
        }
        self.process_actions(node, buffer);
        self.note_completion();
    }

    fn note_completion(&mut self) {
        if self.sender_finished_at.is_none() && self.sender.is_finished() {
            self.sender_finished_at = Some(self.time);
            self.event(format!("[Sender] finished at {}ms", self.time));
        }
        if self.receiver_finished_at.is_none() && self.receiver.is_finished() {
            self.receiver_finished_at = Some(self.time);
            self.event(format!("[Receiver] finished at {}ms", self.time));
        }
    }

    pub fn init(&mut self) {
        self.dispatch(NodeId::Sender, |sender, _, ctx| sender.on_start(ctx));
        self.dispatch(NodeId::Receiver, |_, receiver, ctx| receiver.on_start(ctx));
    }

    /// Process the next event. Returns false once the queue is empty.
    pub fn step(&mut self) -> bool {
        let Some(event) = self.event_queue.pop() else {
            return false;
        };
        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::FrameArrival { to, from, frame } => {
                self.dispatch(to, |sender, receiver, ctx| match to {
                    NodeId::Sender => sender.on_frame(ctx, from, frame),
                    NodeId::Receiver => receiver.on_frame(ctx, from, frame),
                });
            }
            EventType::TimerExpiry { node, generation } => {
                if self.timer_generations.get(&node) != Some(&generation) {
                    debug!("Skipping superseded timer for {:?}", node);
                    return true;
                }
                self.dispatch(node, |sender, receiver, ctx| match node {
                    NodeId::Sender => sender.on_timeout(ctx),
                    NodeId::Receiver => receiver.on_timeout(ctx),
                });
            }
        }
        true
    }

    /// Run until the queue drains. Under total loss the sender retransmits
    /// forever; use [`Simulator::run_until`] when that is possible.
    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    /// Run until the queue drains or simulated time passes `limit_ms`.
    /// Returns whether both endpoints finished.
    pub fn run_until(&mut self, limit_ms: u64) -> bool {
        self.init();
        while let Some(next) = self.peek_next_event_time() {
            if next > limit_ms {
                break;
            }
            self.step();
        }
        self.is_complete()
    }

    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration_ms: self.time,
            sender_finished_at: self.sender_finished_at,
            receiver_finished_at: self.receiver_finished_at,
            sender_frame_count: self.sender_frame_count,
            receiver_frame_count: self.receiver_frame_count,
            link_events: self.link_events.clone(),
        }
    }

    fn event(&mut self, description: String) {
        self.link_events.push(LinkEventSummary {
            time: self.time,
            description,
        });
    }

    fn take_one_shot(&mut self, source: NodeId, frame: &Frame) -> bool {
        let list = match (source, frame.kind) {
            (NodeId::Sender, FrameKind::Data) => &mut self.drop_data_once,
            (NodeId::Sender, FrameKind::Control) if !frame.is_ack() => {
                &mut self.drop_control_once
            }
            (NodeId::Receiver, _) if frame.is_ack() => &mut self.drop_ack_once,
            _ => return false,
        };
        match list.iter().position(|seq| *seq == frame.seq) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    fn process_actions(&mut self, source: NodeId, buffer: ActionBuffer) {
        for command in buffer.timer {
            let generation = self.timer_generations.entry(source).or_insert(0);
            *generation += 1;
            let generation = *generation;
            if let TimerCommand::Start(delay) = command {
                self.push_event(
                    self.time + delay.as_millis() as u64,
                    EventType::TimerExpiry {
                        node: source,
                        generation,
                    },
                );
            }
        }

        for (to, frame) in buffer.outgoing {
            match source {
                NodeId::Sender => self.sender_frame_count += 1,
                NodeId::Receiver => self.receiver_frame_count += 1,
            }

            let Some(target) = NodeId::from_addr(to).filter(|node| *node == source.peer()) else {
                self.event(format!("[{:?}] UNROUTABLE {} to {}", source, frame, to));
                continue;
            };

            if self.take_one_shot(source, &frame) {
                self.event(format!("[{:?}->{:?}] DROP (deterministic) {}", source, target, frame));
                debug!("Deterministically dropping {} from {:?}", frame, source);
                continue;
            }

            if self.rng.random::<f64>() < self.config.loss_rate {
                self.event(format!("[{:?}->{:?}] DROP (random loss) {}", source, target, frame));
                debug!("Frame lost in channel");
                continue;
            }

            let max_latency = self.config.max_latency.max(self.config.min_latency);
            let latency = self.rng.random_range(self.config.min_latency..=max_latency);
            self.event(format!(
                "[{:?}->{:?}] SEND {} (latency={}ms)",
                source, target, frame, latency
            ));
            self.push_event(
                self.time + latency,
                EventType::FrameArrival {
                    to: target,
                    from: source.addr(),
                    frame,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Arms a 10ms timer and a 5ms timer; the 5ms one cancels the other.
    #[derive(Default)]
    struct TimerProbe {
        fired: u32,
    }

    impl ArqEndpoint for TimerProbe {
        fn on_start(&mut self, ctx: &mut dyn LinkContext) {
            ctx.start_timer(Duration::from_millis(10));
            ctx.start_timer(Duration::from_millis(5));
        }

        fn on_frame(&mut self, _ctx: &mut dyn LinkContext, _from: SocketAddr, _frame: Frame) {}

        fn on_timeout(&mut self, _ctx: &mut dyn LinkContext) {
            self.fired += 1;
        }

        fn is_finished(&self) -> bool {
            false
        }
    }

    /// Sends one frame to a fixed address on start.
    struct Shouter {
        to: SocketAddr,
        frame: Frame,
        heard: Vec<Frame>,
    }

    impl ArqEndpoint for Shouter {
        fn on_start(&mut self, ctx: &mut dyn LinkContext) {
            ctx.send_frame(self.to, self.frame.clone());
        }

        fn on_frame(&mut self, _ctx: &mut dyn LinkContext, _from: SocketAddr, frame: Frame) {
            self.heard.push(frame);
        }

        fn on_timeout(&mut self, _ctx: &mut dyn LinkContext) {}

        fn is_finished(&self) -> bool {
            !self.heard.is_empty()
        }
    }

    fn shouter(to: SocketAddr, frame: Frame) -> Shouter {
        Shouter {
            to,
            frame,
            heard: Vec::new(),
        }
    }

    #[test]
    fn restarted_timer_supersedes_earlier_one() {
        let mut sim = Simulator::new(
            LinkConfig::default(),
            TimerProbe::default(),
            TimerProbe::default(),
        );
        sim.run_until_complete();
        assert_eq!(sim.sender.fired, 1);
        assert_eq!(sim.receiver.fired, 1);
    }

    #[test]
    fn frames_reach_the_peer_within_latency_bounds() {
        let config = LinkConfig {
            min_latency: 20,
            max_latency: 30,
            ..LinkConfig::default()
        };
        let sender = shouter(NodeId::Receiver.addr(), Frame::control(SeqBit::Zero, "start 1"));
        let receiver = shouter(NodeId::Sender.addr(), Frame::ack(SeqBit::Zero));
        let mut sim = Simulator::new(config, sender, receiver);
        sim.run_until_complete();

        assert!(sim.is_complete());
        assert_eq!(sim.receiver.heard[0].payload.as_ref(), b"start 1");
        assert!((20..=30).contains(&sim.current_time()));
    }

    #[test]
    fn one_shot_drop_is_consumed_once() {
        let sender = shouter(NodeId::Receiver.addr(), Frame::data(SeqBit::One, "x".into()));
        let receiver = shouter(NodeId::Sender.addr(), Frame::ack(SeqBit::Zero));
        let mut sim = Simulator::new(LinkConfig::default(), sender, receiver);
        sim.add_drop_data_once(SeqBit::One);
        sim.run_until_complete();

        assert!(sim.receiver.heard.is_empty());
        assert!(sim.drop_data_once.is_empty());
        assert!(sim.link_events.iter().any(|e| e.description.contains("DROP (deterministic)")));
    }

    #[test]
    fn frames_to_unknown_addresses_are_not_delivered() {
        let sender = shouter("10.9.9.9:1".parse().unwrap(), Frame::ack(SeqBit::Zero));
        let receiver = shouter(NodeId::Sender.addr(), Frame::ack(SeqBit::Zero));
        let mut sim = Simulator::new(LinkConfig::default(), sender, receiver);
        sim.run_until_complete();
        assert!(sim.receiver.heard.is_empty());
        assert!(sim.link_events.iter().any(|e| e.description.contains("UNROUTABLE")));
    }

    #[test]
    fn run_until_stops_at_the_limit() {
        /// Re-arms its timer forever.
        struct Ticker;
        impl ArqEndpoint for Ticker {
            fn on_start(&mut self, ctx: &mut dyn LinkContext) {
                ctx.start_timer(Duration::from_millis(100));
            }
            fn on_frame(&mut self, _: &mut dyn LinkContext, _: SocketAddr, _: Frame) {}
            fn on_timeout(&mut self, ctx: &mut dyn LinkContext) {
                ctx.start_timer(Duration::from_millis(100));
            }
            fn is_finished(&self) -> bool {
                false
            }
        }

        let mut sim = Simulator::new(LinkConfig::default(), Ticker, Ticker);
        assert!(!sim.run_until(1_000));
        assert_eq!(sim.current_time(), 1_000);
        assert_eq!(sim.peek_next_event_time(), Some(1_100));
    }
}
