use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

/// An unreliable datagram transport with bounded waits.
pub trait DatagramChannel {
    fn send_to(&self, buf: &[u8], to: SocketAddr) -> io::Result<usize>;

    /// Wait at most `timeout` for one datagram. `Ok(None)` means the wait
    /// elapsed without traffic.
    fn recv_from(&self, buf: &mut [u8], timeout: Duration)
    -> io::Result<Option<(usize, SocketAddr)>>;
}

impl DatagramChannel for UdpSocket {
    fn send_to(&self, buf: &[u8], to: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, to)
    }

    fn recv_from(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<(usize, SocketAddr)>> {
        // A zero read timeout is rejected by the OS.
        self.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        match UdpSocket::recv_from(self, buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            // ICMP port-unreachable for an earlier send, e.g. before the peer bound its port.
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
