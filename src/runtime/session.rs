//! Connected stream session to the echo server.
//!
//! The socket is opened and connected in blocking mode through `socket2`,
//! then switched to non-blocking I/O and handed to `mio` so that a receive
//! which would block can wait on readiness for a bounded time instead of
//! sleeping blind.

use crate::fault::{ConnectFault, Fault};
use crate::protocols::echo::RECORD_LEN;
use mio::{Events, Interest, Poll, Token};
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tracing::{debug, info, warn};

const SESSION_TOKEN: Token = Token(0);

/// Extra receive buffer requested beyond one expected block.
const RCVBUF_MARGIN: usize = 128;

/// Outcome of a non-blocking receive that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// Bytes were placed at the front of the buffer.
    Data(usize),
    /// Nothing ready yet.
    WouldBlock,
}

/// Byte transport the test loop runs over.
pub trait Transport {
    /// Send one probe. Anything short of the full record is a fault.
    fn send_probe(&mut self, probe: [u8; RECORD_LEN]) -> Result<(), Fault>;

    /// Read whatever is ready, up to `buf.len()` bytes.
    ///
    /// A zero-length read means the peer closed and is reported as
    /// `Fault::ConnectionLost`.
    fn receive(&mut self, buf: &mut [u8]) -> Result<Received, Fault>;

    /// Pause until data may be ready, for at most `max`.
    fn wait_readable(&mut self, max: Duration) -> Result<(), Fault>;
}

/// One connected, non-blocking TCP stream.
pub struct Session {
    stream: mio::net::TcpStream,
    poll: Poll,
    events: Events,
    peer: SocketAddrV4,
    recv_buffer_size: Option<usize>,
}

impl Session {
    /// Connect to `server:port` and configure the socket for the test loop.
    ///
    /// The receive buffer is sized to hold one expected block plus margin;
    /// failing to size it is logged and otherwise ignored.
    pub fn connect(
        server: &str,
        port: u16,
        expected_block_bytes: usize,
        connect_timeout: Option<Duration>,
    ) -> Result<Self, ConnectFault> {
        let ip: Ipv4Addr = server
            .parse()
            .map_err(|_| ConnectFault::BadAddress(server.to_string()))?;
        let peer = SocketAddrV4::new(ip, port);

        let socket = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::STREAM,
            Some(socket2::Protocol::TCP),
        )
        .map_err(ConnectFault::OpenFailed)?;

        info!(peer = %peer, "Connecting");
        let target: socket2::SockAddr = SocketAddr::V4(peer).into();
        let connected = match connect_timeout {
            Some(timeout) => socket.connect_timeout(&target, timeout),
            None => socket.connect(&target),
        };
        connected.map_err(|e| match e.kind() {
            io::ErrorKind::ConnectionRefused => ConnectFault::Refused(peer),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ConnectFault::TimedOut(peer),
            _ => ConnectFault::Other(e),
        })?;

        socket
            .set_nonblocking(true)
            .map_err(ConnectFault::NonBlocking)?;

        let wanted = expected_block_bytes + RCVBUF_MARGIN;
        if let Err(e) = socket.set_recv_buffer_size(wanted) {
            warn!(size = wanted, error = %e, "Setting receive buffer size failed");
        }
        let recv_buffer_size = socket.recv_buffer_size().ok();

        let mut stream = mio::net::TcpStream::from_std(socket.into());
        let poll = Poll::new().map_err(ConnectFault::Other)?;
        poll.registry()
            .register(&mut stream, SESSION_TOKEN, Interest::READABLE)
            .map_err(ConnectFault::Other)?;

        info!(peer = %peer, recv_buffer = ?recv_buffer_size, "Connected");

        Ok(Self {
            stream,
            poll,
            events: Events::with_capacity(4),
            peer,
            recv_buffer_size,
        })
    }

    pub fn peer_addr(&self) -> SocketAddrV4 {
        self.peer
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// Receive buffer size reported by the OS after configuration.
    pub fn recv_buffer_size(&self) -> Option<usize> {
        self.recv_buffer_size
    }

    /// Shut the connection down. The session cannot be used afterwards.
    pub fn close(mut self) {
        let _ = self.poll.registry().deregister(&mut self.stream);
        let _ = self.stream.shutdown(Shutdown::Both);
        debug!(peer = %self.peer, "Session closed");
    }
}

impl Transport for Session {
    fn send_probe(&mut self, probe: [u8; RECORD_LEN]) -> Result<(), Fault> {
        match self.stream.write(&probe) {
            Ok(n) if n == probe.len() => Ok(()),
            Ok(n) => Err(Fault::ShortSend {
                sent: n,
                expected: probe.len(),
            }),
            Err(e) => Err(Fault::Send(e)),
        }
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<Received, Fault> {
        match self.stream.read(buf) {
            Ok(0) => Err(Fault::ConnectionLost),
            Ok(n) => Ok(Received::Data(n)),
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted =>
            {
                Ok(Received::WouldBlock)
            }
            Err(e) => Err(Fault::Receive(e)),
        }
    }

    fn wait_readable(&mut self, max: Duration) -> Result<(), Fault> {
        match self.poll.poll(&mut self.events, Some(max)) {
            Ok(()) => Ok(()),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => Ok(()),
            Err(e) => Err(Fault::Receive(e)),
        }
    }
}
