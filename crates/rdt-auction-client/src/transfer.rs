//! Starts the file hand-off once the auction has named both parties.

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::PathBuf;

use rdt_auction_arq::{ReceiveReport, SendReport, receive, send_file};
use rdt_auction_proto::ArqConfig;
use tracing::info;

use crate::error::ClientError;

pub const DEFAULT_SEND_FILE: &str = "tosend.file";
pub const DEFAULT_RECV_FILE: &str = "recved.file";

#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Port the winning buyer listens on; the seller sends to it.
    pub rdt_port: u16,
    pub arq: ArqConfig,
    pub send_file: PathBuf,
    pub recv_file: PathBuf,
}

impl TransferSettings {
    pub fn new(rdt_port: u16, arq: ArqConfig) -> Self {
        Self {
            rdt_port,
            arq,
            send_file: PathBuf::from(DEFAULT_SEND_FILE),
            recv_file: PathBuf::from(DEFAULT_RECV_FILE),
        }
    }
}

/// Seller side: send the item file to the winner.
pub async fn deliver_item(
    winner_ip: IpAddr,
    settings: &TransferSettings,
) -> Result<SendReport, ClientError> {
    let settings = settings.clone();
    let report = tokio::task::spawn_blocking(move || {
        let socket = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))?;
        println!("UDP socket opened for RDT.");
        println!("Start sending file.");
        let peer = SocketAddr::new(winner_ip, settings.rdt_port);
        let report = send_file(&socket, peer, &settings.send_file, &settings.arq)?;
        println!("UDP socket closed after transfer.");
        Ok::<_, ClientError>(report)
    })
    .await??;
    info!(
        "Sent {} bytes in {:.3}s with {} retransmissions",
        report.bytes_sent,
        report.elapsed.as_secs_f64(),
        report.stats.retransmissions
    );
    Ok(report)
}

/// Winner side: receive the item from the seller and store it.
pub async fn collect_item(
    seller_ip: IpAddr,
    settings: &TransferSettings,
) -> Result<ReceiveReport, ClientError> {
    let settings = settings.clone();
    let report = tokio::task::spawn_blocking(move || {
        let socket = UdpSocket::bind(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            settings.rdt_port,
        ))?;
        println!("UDP socket opened for RDT.");
        println!("Start receiving file.");
        let report = receive(&socket, Some(seller_ip), &settings.arq)?;
        fs::write(&settings.recv_file, &report.payload).map_err(|source| {
            ClientError::WriteItem {
                path: settings.recv_file.clone(),
                source,
            }
        })?;
        println!("Transmission finished: {}", report.summary());
        Ok::<_, ClientError>(report)
    })
    .await??;
    Ok(report)
}
