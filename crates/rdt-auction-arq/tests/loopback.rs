use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::thread;

use rdt_auction_arq::{
    ArqReceiver, ArqSender, LossSimulator, TransferError, receive, run_receiver, run_sender,
    send, send_file,
};
use rdt_auction_proto::ArqConfig;

fn config(chunk_size: usize) -> ArqConfig {
    ArqConfig {
        timeout_ms: 30,
        chunk_size,
        loss_rate: None,
    }
}

fn bind() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn transfer(payload: Vec<u8>, chunk_size: usize) -> Vec<u8> {
    let cfg = config(chunk_size);
    let (rx_socket, rx_addr) = bind();
    let (tx_socket, _) = bind();

    let rx_cfg = cfg.clone();
    let receiver = thread::spawn(move || receive(&rx_socket, None, &rx_cfg).unwrap());
    let sent = send(&tx_socket, rx_addr, payload.clone(), &cfg).unwrap();
    let report = receiver.join().unwrap();

    assert_eq!(sent.bytes_sent, payload.len());
    assert_eq!(report.declared_size, Some(payload.len() as u64));
    report.payload.to_vec()
}

#[test]
fn payload_shorter_than_one_chunk() {
    let payload = b"auction item".to_vec();
    assert_eq!(transfer(payload.clone(), 2000), payload);
}

#[test]
fn payload_of_exact_chunk_multiple() {
    let payload = pattern(4000);
    assert_eq!(transfer(payload.clone(), 2000), payload);
}

#[test]
fn payload_with_partial_last_chunk() {
    let payload = pattern(5001);
    assert_eq!(transfer(payload.clone(), 2000), payload);
}

#[test]
fn survives_ack_and_frame_loss() {
    let cfg = config(500);
    let payload = pattern(6000);
    let (rx_socket, rx_addr) = bind();
    let (tx_socket, tx_addr) = bind();

    let rx_cfg = cfg.clone();
    let receiver = thread::spawn(move || {
        let rx = ArqReceiver::new(Some(tx_addr.ip()), &rx_cfg)
            .with_frame_loss(LossSimulator::seeded(Some(0.2), 11));
        run_receiver(&rx_socket, rx, &rx_cfg).unwrap()
    });
    let tx = ArqSender::new(rx_addr, payload.clone(), &cfg)
        .unwrap()
        .with_ack_loss(LossSimulator::seeded(Some(0.2), 5));
    let sent = run_sender(&tx_socket, tx, &cfg).unwrap();
    let report = receiver.join().unwrap();

    assert_eq!(report.payload.to_vec(), payload);
    assert!(sent.stats.retransmissions > 0);
    assert!(report.stats.frames_dropped > 0 || sent.stats.acks_dropped > 0);
}

#[test]
fn unreadable_source_is_reported() {
    let (socket, _) = bind();
    let (_, peer) = bind();
    let err = send_file(
        &socket,
        peer,
        Path::new("/nonexistent/tosend.file"),
        &config(2000),
    )
    .unwrap_err();
    assert!(matches!(err, TransferError::UnreadableSource { .. }));
}

#[test]
fn empty_payload_sends_nothing() {
    let (socket, _) = bind();
    let (listener, peer) = bind();
    let err = send(&socket, peer, Vec::new(), &config(2000)).unwrap_err();
    assert!(matches!(err, TransferError::EmptyPayload));

    listener.set_nonblocking(true).unwrap();
    let mut buf = [0u8; 16];
    assert!(listener.recv_from(&mut buf).is_err());
}
