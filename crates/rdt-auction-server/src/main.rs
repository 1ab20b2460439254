use anyhow::{Context, Result};
use clap::Parser;
use rdt_auction_server::AuctionServer;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sealed-bid auction server")]
struct Args {
    /// TCP port to listen on for sellers and buyers.
    port: u16,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let server = AuctionServer::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("Failed to listen on port {}", args.port))?;
    server.run().await.context("Accept loop failed")
}
