use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{info, warn};

use crate::coordinator::Coordinator;
use crate::session::run_session;

/// Accepts control-channel connections and hands each one to its own task.
pub struct AuctionServer {
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
    next_conn: AtomicU64,
}

impl AuctionServer {
    pub async fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr).await?,
            coordinator: Arc::new(Coordinator::new()),
            next_conn: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        self.coordinator.clone()
    }

    pub async fn run(self) -> io::Result<()> {
        info!("Auctioneer is ready for hosting auctions!");
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let conn = self.next_conn.fetch_add(1, Ordering::Relaxed);
            let coordinator = self.coordinator.clone();
            tokio::spawn(async move {
                if let Err(e) = run_session(coordinator, conn, addr, stream).await {
                    warn!("Connection from {} broke with an error: {}", addr, e);
                }
            });
        }
    }
}
