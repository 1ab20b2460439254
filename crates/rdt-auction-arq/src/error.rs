use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("nothing to send: the payload is empty")]
    EmptyPayload,
    #[error("cannot read {path}: {source}")]
    UnreadableSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("chunk size must be positive")]
    ZeroChunkSize,
    #[error("chunk size {chunk_size} exceeds the {max}-byte datagram payload limit")]
    ChunkTooLarge { chunk_size: usize, max: usize },
    #[error("datagram channel failed: {0}")]
    Io(#[from] io::Error),
}
