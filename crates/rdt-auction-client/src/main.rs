use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use rdt_auction_client::transfer::{DEFAULT_RECV_FILE, DEFAULT_SEND_FILE};
use rdt_auction_client::{Outcome, TransferSettings, run_client};
use rdt_auction_proto::ArqConfig;
use rdt_auction_proto::config::DEFAULT_TIMEOUT_MS;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sealed-bid auction client")]
struct Args {
    /// Address of the auction server.
    server_ip: IpAddr,

    /// TCP port of the auction server.
    port: u16,

    /// UDP port used for the item transfer.
    rdt_port: u16,

    /// Simulated loss rate in [0.0, 1.0] for acks (seller) or frames (buyer).
    loss_rate: Option<f64>,

    /// File the seller sends to the winner.
    #[arg(long, default_value = DEFAULT_SEND_FILE)]
    send_file: PathBuf,

    /// Where the winner stores the received item.
    #[arg(long, default_value = DEFAULT_RECV_FILE)]
    recv_file: PathBuf,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Some(rate) = args.loss_rate {
        ensure!((0.0..=1.0).contains(&rate), "loss rate must be within [0.0, 1.0], got {rate}");
    }

    let settings = TransferSettings {
        rdt_port: args.rdt_port,
        arq: ArqConfig {
            timeout_ms: args.timeout_ms,
            loss_rate: args.loss_rate,
            ..ArqConfig::default()
        },
        send_file: args.send_file,
        recv_file: args.recv_file,
    };

    let stream = TcpStream::connect((args.server_ip, args.port))
        .await
        .with_context(|| format!("Failed to connect to {}:{}", args.server_ip, args.port))?;
    println!("Connected to the Auctioneer server.");

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let outcome = run_client(stream, &mut input, &settings)
        .await
        .context("Auction session failed")?;
    if let Outcome::Rejected(_) = outcome {
        std::process::exit(1);
    }
    Ok(())
}
