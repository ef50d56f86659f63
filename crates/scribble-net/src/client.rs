use crate::codec::{FrameReader, FrameWriter};
use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{Command, CommandKind, Frame, Reply, Response};
use crate::transport::{Endpoint, Stream};

/// The frontend end of a session.
///
/// Requests are answered in order. Everything the backend sends before the
/// answer (events, program output, warnings) is handed to the caller.
pub struct Client {
    reader: FrameReader<Stream>,
    writer: FrameWriter<Stream>,
    version: u32,
}

impl Client {
    /// Connect and perform the `hello` handshake.
    pub fn connect(endpoint: &Endpoint) -> ProtocolResult<Client> {
        let stream = Stream::connect(endpoint)?;
        let mut client = Client {
            reader: FrameReader::new(stream.try_clone()?),
            writer: FrameWriter::new(stream),
            version: 0,
        };
        match client.request(Command::new(CommandKind::Hello), |_| {})? {
            Response::Result(Reply::Hello { version }) => {
                log::debug!(target: "ipc", "connected to {} (protocol {})", endpoint, version);
                client.version = version;
                Ok(client)
            }
            other => Err(ProtocolError::Unexpected {
                expected: "a hello reply",
                received: Frame::Response(other).describe(),
            }),
        }
    }

    /// Protocol revision the backend announced.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn send(&mut self, command: &Command) -> ProtocolResult<()> {
        self.writer.write_frame(&Frame::Command(command.clone()))
    }

    /// Send `command` and wait for its response.
    pub fn request<F>(&mut self, command: Command, mut on_frame: F) -> ProtocolResult<Response>
    where
        F: FnMut(&Frame),
    {
        self.send(&command)?;
        loop {
            match self.reader.expect_frame()? {
                Frame::Response(response) => return Ok(response),
                frame @ Frame::Command(_) => {
                    return Err(ProtocolError::Unexpected {
                        expected: "a response",
                        received: frame.describe(),
                    })
                }
                frame => on_frame(&frame),
            }
        }
    }

    /// End the session politely.
    pub fn close(mut self) -> ProtocolResult<()> {
        match self.request(Command::new(CommandKind::Goodbye), |_| {})? {
            Response::Result(Reply::Goodbye) => Ok(()),
            other => Err(ProtocolError::Unexpected {
                expected: "a goodbye reply",
                received: Frame::Response(other).describe(),
            }),
        }
    }
}
