/// Blocking socket transport carrying framed messages
use super::Message;
use crate::core::Address;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::fd::OwnedFd;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);

fn next_request_id() -> i32 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Connected byte stream to one server
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    /// Dial `addr`, giving up after `connect_timeout`.
    /// `socket_timeout` bounds every later read and write; `None` blocks forever.
    pub fn connect(
        addr: &Address,
        connect_timeout: Duration,
        socket_timeout: Option<Duration>,
    ) -> io::Result<Stream> {
        let (socket, target) = match addr {
            Address::Inet(sa) => (
                Socket::new(Domain::for_address(*sa), Type::STREAM, Some(Protocol::TCP))?,
                SockAddr::from(*sa),
            ),
            #[cfg(unix)]
            Address::Unix(path) => (
                Socket::new(Domain::UNIX, Type::STREAM, None)?,
                SockAddr::unix(path)?,
            ),
            #[cfg(not(unix))]
            Address::Unix(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "domain sockets are not supported on this platform",
                ))
            }
        };

        socket.connect_timeout(&target, connect_timeout)?;
        socket.set_read_timeout(socket_timeout)?;
        socket.set_write_timeout(socket_timeout)?;

        match addr {
            Address::Inet(_) => {
                // Requests are small and latency bound
                if let Err(e) = socket.set_nodelay(true) {
                    warn!("Failed to disable Nagle on {}: {}", addr, e);
                }
                Ok(Stream::Tcp(socket.into()))
            }
            #[cfg(unix)]
            Address::Unix(_) => Ok(Stream::Unix(UnixStream::from(OwnedFd::from(socket)))),
            #[cfg(not(unix))]
            Address::Unix(_) => unreachable!(),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Stream::Unix(s) => s.flush(),
        }
    }
}

/// Request/response exchange over one stream
#[derive(Debug)]
pub struct MessagingPort {
    stream: Stream,
    remote: Address,
}

impl MessagingPort {
    pub fn connect(
        remote: &Address,
        connect_timeout: Duration,
        socket_timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let stream = Stream::connect(remote, connect_timeout, socket_timeout)?;
        Ok(Self {
            stream,
            remote: remote.clone(),
        })
    }

    pub fn remote(&self) -> &Address {
        &self.remote
    }

    /// Send `request` with a fresh request id and block for its reply
    pub fn call(&mut self, mut request: Message) -> io::Result<Message> {
        let request_id = next_request_id();
        request.header.request_id = request_id;
        request.write_to(&mut self.stream)?;

        let reply = Message::read_from(&mut self.stream)?;
        if reply.header.response_to != request_id {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "reply answers request {} but {} was sent",
                    reply.header.response_to, request_id
                ),
            ));
        }

        debug!(
            "{} answered request {} with {} bytes",
            self.remote,
            request_id,
            reply.header.message_length
        );
        Ok(reply)
    }
}
