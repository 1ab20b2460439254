use std::fs;
use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::time::Duration;

use rdt_auction_client::{BuyerOutcome, Outcome, SellerOutcome, TransferSettings, run_client};
use rdt_auction_proto::ArqConfig;
use rdt_auction_server::AuctionServer;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rdt-auction-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn free_udp_port() -> u16 {
    UdpSocket::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

async fn client(
    server: SocketAddr,
    typed: &'static str,
    settings: TransferSettings,
) -> Outcome {
    let stream = TcpStream::connect(server).await.unwrap();
    let mut input = BufReader::new(typed.as_bytes()).lines();
    run_client(stream, &mut input, &settings).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn sold_item_reaches_the_winner() {
    let dir = scratch("sold");
    let item: Vec<u8> = (0..9_000u32).map(|i| (i % 253) as u8).collect();
    fs::write(dir.join("tosend.file"), &item).unwrap();

    let server = AuctionServer::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let coordinator = server.coordinator();
    tokio::spawn(server.run());

    let settings = TransferSettings {
        rdt_port: free_udp_port(),
        arq: ArqConfig {
            timeout_ms: 50,
            loss_rate: Some(0.1),
            ..ArqConfig::default()
        },
        send_file: dir.join("tosend.file"),
        recv_file: dir.join("recved.file"),
    };

    let seller = tokio::spawn(client(addr, "0 10 2 lamp\n", settings.clone()));
    while coordinator.current_request().is_none() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let high = tokio::spawn(client(addr, "80\n", settings.clone()));
    let low = tokio::spawn(client(addr, "35\n", settings.clone()));

    let high = high.await.unwrap();
    let low = low.await.unwrap();
    let seller = seller.await.unwrap();

    let localhost = "127.0.0.1".parse().unwrap();
    assert_eq!(
        seller,
        Outcome::Seller(SellerOutcome::Sold {
            item: "lamp".into(),
            payment: 35,
            buyer_ip: localhost
        })
    );
    assert_eq!(
        high,
        Outcome::Buyer(BuyerOutcome::Won {
            item: "lamp".into(),
            payment: 35,
            seller_ip: localhost
        })
    );
    assert_eq!(low, Outcome::Buyer(BuyerOutcome::Lost));
    assert_eq!(fs::read(dir.join("recved.file")).unwrap(), item);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_item_file_fails_the_seller() {
    let dir = scratch("missing");
    let server = AuctionServer::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let coordinator = server.coordinator();
    tokio::spawn(server.run());

    let settings = TransferSettings {
        rdt_port: free_udp_port(),
        arq: ArqConfig {
            timeout_ms: 50,
            ..ArqConfig::default()
        },
        send_file: dir.join("does-not-exist.file"),
        recv_file: dir.join("recved.file"),
    };

    let seller_settings = settings.clone();
    let seller = tokio::spawn(async move {
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut input = BufReader::new(&b"1 0 1 lamp\n"[..]).lines();
        run_client(stream, &mut input, &seller_settings).await
    });
    while coordinator.current_request().is_none() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // The winner would wait forever for a sender that never starts; only
    // its negotiation is exercised here.
    let stream = TcpStream::connect(addr).await.unwrap();
    let mut channel = rdt_auction_client::ControlChannel::new(stream);
    let mut input = BufReader::new(&b"5\n"[..]).lines();
    let outcome = rdt_auction_client::negotiate(&mut channel, &mut input)
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Buyer(BuyerOutcome::Won { .. })));

    let err = seller.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        rdt_auction_client::ClientError::Transfer(
            rdt_auction_arq::TransferError::UnreadableSource { .. }
        )
    ));
}
