use std::io;

use rdt_auction_proto::Notice;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, ReadHalf, WriteHalf,
};
use tracing::debug;

/// Line-oriented view of the connection to the auction server.
pub struct ControlChannel<S> {
    lines: Lines<BufReader<ReadHalf<S>>>,
    writer: WriteHalf<S>,
}

impl<S: AsyncRead + AsyncWrite> ControlChannel<S> {
    pub fn new(stream: S) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Next server notice, or `None` once the server has closed the connection.
    pub async fn recv(&mut self) -> io::Result<Option<Notice>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    debug!("Server: {}", line);
                    return Ok(Some(Notice::parse(&line)));
                }
                None => return Ok(None),
            }
        }
    }

    pub async fn send(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    pub async fn close(mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}
