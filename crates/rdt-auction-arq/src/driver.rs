//! Blocking loops that run an [`ArqEndpoint`] over a [`DatagramChannel`].
//!
//! Endpoints never touch the socket. Each callback records its sends and
//! timer changes in an [`ActionBuffer`], which the driver then applies.

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rdt_auction_proto::config::RECV_BUFFER_LEN;
use rdt_auction_proto::{ArqConfig, ArqEndpoint, Frame, LinkContext};
use tracing::{debug, info, warn};

use crate::channel::DatagramChannel;
use crate::error::TransferError;
use crate::receiver::ArqReceiver;
use crate::report::{ReceiveReport, SendReport};
use crate::sender::ArqSender;

enum TimerCommand {
    Start(Duration),
    Cancel,
}

/// Actions buffered during one endpoint callback.
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

struct Driver<'c, C: DatagramChannel> {
    channel: &'c C,
    /// How long to wait for traffic while no timer is armed.
    idle_poll: Duration,
    deadline: Option<Instant>,
    first_datagram: Option<Instant>,
    malformed: u64,
    datagram: Box<[u8]>,
}

impl<'c, C: DatagramChannel> Driver<'c, C> {
    fn new(channel: &'c C, idle_poll: Duration) -> Self {
        Self {
            channel,
            idle_poll,
            deadline: None,
            first_datagram: None,
            malformed: 0,
            datagram: vec![0; RECV_BUFFER_LEN].into_boxed_slice(),
        }
    }

    fn dispatch(&mut self, callback: impl FnOnce(&mut dyn LinkContext)) {
        let mut buffer = ActionBuffer::default();
        let mut ctx = ScopedContext {
            buffer: &mut buffer,
        };
        callback(&mut ctx as &mut dyn LinkContext);
        self.process_actions(buffer);
    }

    fn process_actions(&mut self, buffer: ActionBuffer) {
        for command in buffer.timer {
            self.deadline = match command {
                TimerCommand::Start(delay) => Some(Instant::now() + delay),
                TimerCommand::Cancel => None,
            };
        }
        for (to, frame) in buffer.outgoing {
            // A failed send is recovered like a lost frame: by the next timeout.
            if let Err(err) = self.channel.send_to(&frame.encode(), to) {
                warn!("Failed to send {} to {}: {}", frame, to, err);
            }
        }
    }

    /// Wait for at most one datagram or timer expiry and hand it to `endpoint`.
    fn step<E: ArqEndpoint>(
        &mut self,
        endpoint: &mut E,
        max_wait: Duration,
    ) -> Result<(), TransferError> {
        let wait = match self.deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => max_wait,
        };

        if let Some((len, from)) = self.channel.recv_from(&mut self.datagram, wait)? {
            self.first_datagram.get_or_insert_with(Instant::now);
            match Frame::decode(&self.datagram[..len]) {
                Ok(frame) => self.dispatch(|ctx| endpoint.on_frame(ctx, from, frame)),
                Err(err) => {
                    debug!("Discarding datagram from {}: {}", from, err);
                    self.malformed += 1;
                }
            }
        }

        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            self.deadline = None;
            self.dispatch(|ctx| endpoint.on_timeout(ctx));
        }
        Ok(())
    }

    fn run<E: ArqEndpoint>(&mut self, endpoint: &mut E) -> Result<(), TransferError> {
        self.dispatch(|ctx| endpoint.on_start(ctx));
        while !endpoint.is_finished() {
            self.step(endpoint, self.idle_poll)?;
        }
        Ok(())
    }

    /// Keep answering for `period` after the endpoint finished.
    fn linger<E: ArqEndpoint>(
        &mut self,
        endpoint: &mut E,
        period: Duration,
    ) -> Result<(), TransferError> {
        let until = Instant::now() + period;
        loop {
            let remaining = until.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            self.step(endpoint, remaining)?;
        }
    }
}

/// Transfer `payload` to `peer` and return once the `fin` is acknowledged.
///
/// There is no retry ceiling: an unreachable peer stalls this call.
pub fn send<C: DatagramChannel>(
    channel: &C,
    peer: SocketAddr,
    payload: impl Into<Bytes>,
    config: &ArqConfig,
) -> Result<SendReport, TransferError> {
    run_sender(channel, ArqSender::new(peer, payload, config)?, config)
}

/// Read `path` and transfer its contents to `peer`.
pub fn send_file<C: DatagramChannel>(
    channel: &C,
    peer: SocketAddr,
    path: &Path,
    config: &ArqConfig,
) -> Result<SendReport, TransferError> {
    let payload = fs::read(path).map_err(|source| TransferError::UnreadableSource {
        path: path.to_path_buf(),
        source,
    })?;
    send(channel, peer, payload, config)
}

pub fn run_sender<C: DatagramChannel>(
    channel: &C,
    mut sender: ArqSender,
    config: &ArqConfig,
) -> Result<SendReport, TransferError> {
    info!("Start sending {} bytes to {}", sender.total_size(), sender.peer());
    let started = Instant::now();
    let mut driver = Driver::new(channel, config.timeout());
    driver.run(&mut sender)?;

    let stats = sender.stats().clone();
    info!(
        "Transfer to {} complete: {} bytes, {} retransmissions",
        sender.peer(),
        stats.bytes_acked,
        stats.retransmissions
    );
    Ok(SendReport {
        bytes_sent: stats.bytes_acked,
        elapsed: started.elapsed(),
        stats,
    })
}

/// Receive one payload, answering only frames from `expected_peer` if given.
pub fn receive<C: DatagramChannel>(
    channel: &C,
    expected_peer: Option<IpAddr>,
    config: &ArqConfig,
) -> Result<ReceiveReport, TransferError> {
    run_receiver(channel, ArqReceiver::new(expected_peer, config), config)
}

pub fn run_receiver<C: DatagramChannel>(
    channel: &C,
    mut receiver: ArqReceiver,
    config: &ArqConfig,
) -> Result<ReceiveReport, TransferError> {
    info!("Start receiving file");
    let mut driver = Driver::new(channel, config.timeout());
    driver.run(&mut receiver)?;
    let finished = Instant::now();
    let elapsed = driver
        .first_datagram
        .map(|first| finished.duration_since(first))
        .unwrap_or_default();

    // The sender repeats its fin until our ack gets through.
    driver.linger(&mut receiver, config.timeout())?;

    let report = ReceiveReport {
        declared_size: receiver.declared_size(),
        elapsed,
        stats: receiver.stats().clone(),
        malformed: driver.malformed,
        payload: receiver.into_payload(),
    };
    info!("Transmission finished: {}", report.summary());
    Ok(report)
}
