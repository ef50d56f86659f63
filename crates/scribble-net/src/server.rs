//! The backend side: accepts connections and runs one session per connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use scribble_engine::{BackendConnection, EngineConfig, EventSink, ExecutionMessage, ExecutionMode, OptionStore};
use scribble_source::Diagnostic;

use crate::codec::{FrameReader, FrameWriter};
use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{Command, CommandKind, Failure, Frame, Reply, Response, PROTOCOL_VERSION};
use crate::transport::{Endpoint, Listener, Stream};

/// Source name used when a command does not carry `file=<name>`.
const DEFAULT_SOURCE_NAME: &str = "main.scribble";

type SharedWriter = Arc<Mutex<FrameWriter<Stream>>>;

/// Stop flag of the program a session is currently running.
type CurrentStop = Arc<Mutex<Option<Arc<AtomicBool>>>>;

pub struct Server {
    listener: Listener,
    endpoint: Endpoint,
    config: Arc<EngineConfig>,
}

impl Server {
    /// Bind the listening socket. Clients may connect as soon as this returns.
    pub fn bind(endpoint: &Endpoint, config: Arc<EngineConfig>) -> ProtocolResult<Server> {
        let listener = Listener::bind(endpoint)?;
        let endpoint = listener.local_endpoint()?;
        log::info!(target: "ipc", "listening on {}", endpoint);
        Ok(Server {
            listener,
            endpoint,
            config,
        })
    }

    pub fn local_endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Accept connections forever, each in a thread of its own.
    pub fn serve(self) -> ProtocolResult<()> {
        let mut sessions: u64 = 0;
        loop {
            let stream = match self.listener.accept() {
                Ok(stream) => stream,
                Err(err) => {
                    log::warn!(target: "ipc", "failed to accept a connection: {}", err);
                    continue;
                }
            };
            sessions += 1;
            let id = sessions;
            let config = Arc::clone(&self.config);
            let spawned = thread::Builder::new()
                .name(format!("scribble-session-{}", id))
                .spawn(move || {
                    log::debug!(target: "ipc", "session {} opened", id);
                    match Session::open(id, stream, config) {
                        Ok(session) => match session.run() {
                            Ok(()) => log::debug!(target: "ipc", "session {} closed", id),
                            Err(err) => log::warn!(target: "ipc", "session {} ended: {}", id, err),
                        },
                        Err(err) => log::warn!(target: "ipc", "session {} could not start: {}", id, err),
                    }
                });
            if let Err(err) = spawned {
                log::error!(target: "ipc", "failed to start session {}: {}", id, err);
            }
        }
    }
}

/// Forwards execution messages and program output to the client.
struct StreamSink {
    writer: SharedWriter,
}

impl StreamSink {
    fn send(&self, frame: &Frame) {
        if let Err(err) = self.writer.lock().write_frame(frame) {
            log::debug!(target: "ipc", "dropped {}: {}", frame.describe(), err);
        }
    }
}

impl EventSink for StreamSink {
    fn message(&mut self, message: ExecutionMessage) {
        self.send(&Frame::Event(message));
    }

    fn output(&mut self, text: &str) {
        self.send(&Frame::Output(text.to_string()));
    }
}

struct Session {
    id: u64,
    stream: Stream,
    config: Arc<EngineConfig>,
    writer: SharedWriter,
    connection: Option<BackendConnection>,
    breakpoints: Vec<usize>,
    stop: CurrentStop,
}

impl Session {
    fn open(id: u64, stream: Stream, config: Arc<EngineConfig>) -> ProtocolResult<Session> {
        let writer = FrameWriter::new(stream.try_clone()?);
        Ok(Session {
            id,
            stream,
            config,
            writer: Arc::new(Mutex::new(writer)),
            connection: None,
            breakpoints: Vec::new(),
            stop: Arc::new(Mutex::new(None)),
        })
    }

    /// Serve commands until `goodbye` or until the client goes away.
    fn run(mut self) -> ProtocolResult<()> {
        let (sender, commands) = mpsc::channel();
        let reader_stream = self.stream.try_clone()?;
        let stop = Arc::clone(&self.stop);
        let reader = thread::Builder::new()
            .name(format!("scribble-session-{}-reader", self.id))
            .spawn(move || read_commands(reader_stream, sender, stop))
            .map_err(ProtocolError::from)?;

        let result = self.dispatch(commands);
        // Unblocks the reader if the session ended on our side.
        self.stream.shutdown();
        let _ = reader.join();
        result
    }

    fn dispatch(&mut self, commands: Receiver<ProtocolResult<Command>>) -> ProtocolResult<()> {
        for incoming in commands {
            let (response, done) = match incoming {
                Ok(command) => self.handle(command),
                Err(err) => (Response::Error(Failure::from(&err)), false),
            };
            self.send(&Frame::Response(response))?;
            if done {
                break;
            }
        }
        Ok(())
    }

    fn send(&self, frame: &Frame) -> ProtocolResult<()> {
        self.writer.lock().write_frame(frame)
    }

    fn handle(&mut self, command: Command) -> (Response, bool) {
        let kind = match command.kind() {
            Ok(kind) => kind,
            Err(err) => {
                log::debug!(target: "ipc", "session {}: {}", self.id, err);
                return (Response::Error(Failure::from(&err)), false);
            }
        };
        log::debug!(target: "ipc", "session {}: {}", self.id, kind);

        let result = match kind {
            CommandKind::Hello => Ok(Reply::Hello {
                version: PROTOCOL_VERSION,
            }),
            CommandKind::Compile | CommandKind::Run | CommandKind::Debug => self.start(kind, command),
            CommandKind::Step | CommandKind::StepOver | CommandKind::RunToReturn | CommandKind::Continue => {
                self.resume(kind)
            }
            CommandKind::Break => self.add_breakpoint(&command),
            CommandKind::Stop => self.stop(),
            CommandKind::Goodbye => return (Response::Result(Reply::Goodbye), true),
        };
        match result {
            Ok(reply) => (Response::Result(reply), false),
            Err(failure) => (Response::Error(failure), false),
        }
    }

    /// Begin a new program. Any previous program of the session is dropped.
    fn start(&mut self, kind: CommandKind, command: Command) -> Result<Reply, Failure> {
        let (name, options) = split_arguments(&command.arguments);
        let (config, errors) = (*self.config).clone().with_options(&options);
        for err in &errors {
            log::warn!(target: "ipc", "session {}: {}", self.id, err);
            if let Err(err) = self.send(&Frame::Warning(Diagnostic::from_error(err, None))) {
                return Err(Failure::from(&err));
            }
        }

        let sink = StreamSink {
            writer: Arc::clone(&self.writer),
        };
        let mut connection = BackendConnection::new(Arc::new(config), Box::new(sink));
        for line in &self.breakpoints {
            connection.add_breakpoint(*line);
        }
        *self.stop.lock() = Some(connection.stop_flag());
        connection.load_text(name, command.payload)?;

        let connection = self.connection.insert(connection);
        let reply = match kind {
            CommandKind::Compile => connection.compile().map(|()| Reply::Compiled {
                stage: connection.stage(),
            }),
            CommandKind::Run => connection.run().map(Reply::from),
            _ => connection.debug().map(Reply::from),
        };
        Ok(reply?)
    }

    fn resume(&mut self, kind: CommandKind) -> Result<Reply, Failure> {
        let mode = kind.mode().unwrap_or(ExecutionMode::Continue);
        let connection = self.connection.as_mut().ok_or_else(|| Failure::new("no program has been started"))?;
        Ok(connection.resume(mode).map(Reply::from)?)
    }

    fn add_breakpoint(&mut self, command: &Command) -> Result<Reply, Failure> {
        let line = breakpoint_line(&command.arguments).ok_or_else(|| {
            Failure::from(&ProtocolError::InvalidArguments {
                command: command.command.clone(),
                message: "expected a line number, as 'line=<n>'".to_string(),
            })
        })?;
        if !self.breakpoints.contains(&line) {
            self.breakpoints.push(line);
        }
        if let Some(connection) = self.connection.as_mut() {
            connection.add_breakpoint(line);
        }
        Ok(Reply::Breakpoint { line })
    }

    /// End a suspended program. A running one was already flagged by the
    /// reader; it reports its own exit.
    fn stop(&mut self) -> Result<Reply, Failure> {
        let Some(connection) = self.connection.as_mut() else {
            return Ok(Reply::Ok);
        };
        if !connection.machine().map_or(false, |m| m.is_suspended()) {
            return Ok(Reply::Ok);
        }
        connection.stop_flag().store(true, Ordering::Relaxed);
        Ok(connection.resume(ExecutionMode::Run).map(Reply::from)?)
    }
}

/// Reads commands off the socket and hands them to the session. A `stop`
/// also raises the stop flag right away, so it reaches a program that is
/// still running. So does the client going away.
fn read_commands(stream: Stream, sender: Sender<ProtocolResult<Command>>, stop: CurrentStop) {
    let raise = || {
        if let Some(flag) = stop.lock().as_ref() {
            flag.store(true, Ordering::Relaxed);
        }
    };
    let mut reader = FrameReader::new(stream);
    loop {
        let incoming = match reader.read_frame() {
            Ok(Some(Frame::Command(command))) => Ok(command),
            Ok(Some(frame)) => Err(ProtocolError::Unexpected {
                expected: "a command",
                received: frame.describe(),
            }),
            Ok(None) => break,
            Err(err @ ProtocolError::Malformed { .. }) => Err(err),
            Err(err) => {
                log::debug!(target: "ipc", "reader stopped: {}", err);
                break;
            }
        };
        if matches!(&incoming, Ok(command) if command.command == CommandKind::Stop.name()) {
            raise();
        }
        if sender.send(incoming).is_err() {
            break;
        }
    }
    raise();
}

/// Separate the source name from the configuration options.
fn split_arguments(arguments: &[String]) -> (String, OptionStore) {
    let mut name = DEFAULT_SOURCE_NAME.to_string();
    let mut options = OptionStore::new();
    for argument in arguments {
        match argument.split_once('=') {
            Some(("file", value)) => name = value.to_string(),
            Some((key, value)) => options.set(key, Some(value.to_string())),
            None => options.set(argument.as_str(), None),
        }
    }
    (name, options)
}

fn breakpoint_line(arguments: &[String]) -> Option<usize> {
    arguments.iter().find_map(|argument| {
        let value = argument.strip_prefix("line=").unwrap_or(argument);
        value.parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_arguments() {
        let arguments: Vec<String> = ["debug", "file=demo.scribble", "entry=start", "include=lib"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (name, options) = split_arguments(&arguments);
        assert_eq!(name, "demo.scribble");
        assert_eq!(options.to_pairs(), vec!["debug", "entry=start", "include=lib"]);

        let (name, options) = split_arguments(&[]);
        assert_eq!(name, DEFAULT_SOURCE_NAME);
        assert!(options.is_empty());
    }

    #[test]
    fn test_breakpoint_line() {
        assert_eq!(breakpoint_line(&["line=12".to_string()]), Some(12));
        assert_eq!(breakpoint_line(&["7".to_string()]), Some(7));
        assert_eq!(breakpoint_line(&["line=x".to_string()]), None);
        assert_eq!(breakpoint_line(&[]), None);
    }
}
