//! Unix-domain and TCP sockets behind one interface.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::str::FromStr;

#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};

use crate::error::{ProtocolError, ProtocolResult};

/// Where a backend listens.
///
/// Parsed from a string: `tcp:<host>:<port>` or anything of the form
/// `<host>:<port>` without a path separator is TCP, everything else is the
/// path of a Unix-domain socket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Unix(PathBuf),
    Tcp(String),
}

impl Endpoint {
    /// An ephemeral TCP port on the loopback interface.
    pub fn loopback() -> Self {
        Endpoint::Tcp("127.0.0.1:0".to_string())
    }
}

impl FromStr for Endpoint {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ProtocolError::InvalidArguments {
                command: "connect".to_string(),
                message: "empty endpoint".to_string(),
            });
        }
        if let Some(addr) = s.strip_prefix("tcp:") {
            return Ok(Endpoint::Tcp(addr.to_string()));
        }
        let looks_tcp = !s.contains('/')
            && s.rsplit_once(':').map_or(false, |(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if looks_tcp {
            Ok(Endpoint::Tcp(s.to_string()))
        } else {
            Ok(Endpoint::Unix(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp:{}", addr),
        }
    }
}

pub enum Listener {
    #[cfg(unix)]
    Unix(UnixListener, PathBuf),
    Tcp(TcpListener),
}

impl Listener {
    pub fn bind(endpoint: &Endpoint) -> ProtocolResult<Listener> {
        match endpoint {
            Endpoint::Tcp(addr) => Ok(Listener::Tcp(TcpListener::bind(addr.as_str())?)),
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                remove_stale_socket(path)?;
                Ok(Listener::Unix(UnixListener::bind(path)?, path.clone()))
            }
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(ProtocolError::Transport {
                message: format!("Unix-domain sockets are not available here ({})", path.display()),
            }),
        }
    }

    /// The endpoint clients should connect to. For TCP this carries the port
    /// actually bound.
    pub fn local_endpoint(&self) -> ProtocolResult<Endpoint> {
        match self {
            #[cfg(unix)]
            Listener::Unix(_, path) => Ok(Endpoint::Unix(path.clone())),
            Listener::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?.to_string())),
        }
    }

    pub fn accept(&self) -> ProtocolResult<Stream> {
        match self {
            #[cfg(unix)]
            Listener::Unix(listener, _) => Ok(Stream::Unix(listener.accept()?.0)),
            Listener::Tcp(listener) => {
                let (stream, _) = listener.accept()?;
                stream.set_nodelay(true)?;
                Ok(Stream::Tcp(stream))
            }
        }
    }
}

#[cfg(unix)]
fn remove_stale_socket(path: &std::path::Path) -> io::Result<()> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => std::fs::remove_file(path),
        _ => Ok(()),
    }
}

pub enum Stream {
    #[cfg(unix)]
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl Stream {
    pub fn connect(endpoint: &Endpoint) -> ProtocolResult<Stream> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str())?;
                stream.set_nodelay(true)?;
                Ok(Stream::Tcp(stream))
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(Stream::Unix(UnixStream::connect(path)?)),
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(ProtocolError::Transport {
                message: format!("Unix-domain sockets are not available here ({})", path.display()),
            }),
        }
    }

    pub fn try_clone(&self) -> ProtocolResult<Stream> {
        match self {
            #[cfg(unix)]
            Stream::Unix(stream) => Ok(Stream::Unix(stream.try_clone()?)),
            Stream::Tcp(stream) => Ok(Stream::Tcp(stream.try_clone()?)),
        }
    }

    /// Close both directions, waking up any reader of a clone.
    pub fn shutdown(&self) {
        let _ = match self {
            #[cfg(unix)]
            Stream::Unix(stream) => stream.shutdown(std::net::Shutdown::Both),
            Stream::Tcp(stream) => stream.shutdown(std::net::Shutdown::Both),
        };
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            #[cfg(unix)]
            Stream::Unix(stream) => stream.read(buf),
            Stream::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            #[cfg(unix)]
            Stream::Unix(stream) => stream.write(buf),
            Stream::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            #[cfg(unix)]
            Stream::Unix(stream) => stream.flush(),
            Stream::Tcp(stream) => stream.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parsing() {
        assert_eq!("127.0.0.1:4000".parse(), Ok(Endpoint::Tcp("127.0.0.1:4000".to_string())));
        assert_eq!("tcp:localhost:0".parse(), Ok(Endpoint::Tcp("localhost:0".to_string())));
        assert_eq!("/tmp/scribble.sock".parse(), Ok(Endpoint::Unix(PathBuf::from("/tmp/scribble.sock"))));
        assert_eq!("backend.sock".parse(), Ok(Endpoint::Unix(PathBuf::from("backend.sock"))));
        assert!("".parse::<Endpoint>().is_err());

        let endpoint = Endpoint::Tcp("127.0.0.1:4000".to_string());
        assert_eq!(endpoint.to_string().parse(), Ok(endpoint));
    }
}
