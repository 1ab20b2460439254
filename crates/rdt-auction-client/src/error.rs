use std::io;
use std::path::PathBuf;

use rdt_auction_arq::TransferError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server closed the connection")]
    ServerClosed,
    #[error("input ended before the auction finished")]
    InputClosed,
    #[error("file transfer failed: {0}")]
    Transfer(#[from] TransferError),
    #[error("failed to write {path}: {source}")]
    WriteItem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("transfer task failed: {0}")]
    TransferTask(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Io(#[from] io::Error),
}
