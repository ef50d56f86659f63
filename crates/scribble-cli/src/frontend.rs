//! Starting a backend, sending it a program and presenting what comes back.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use scribble_engine::{EngineConfig, ExitStatus};
use scribble_net::{
    spawn_backend_process, spawn_backend_thread, BackendProcess, BackendThread, Client, Command, CommandKind, Endpoint,
    Frame, ProtocolResult, Reply, Response,
};
use scribble_source::{Diagnostic, Report};

use crate::error::{CliError, CliResult};
use crate::utils::{backend_executable, read_file};

/// Exit code of a program ended by `stop`.
pub const STOPPED_EXIT_CODE: i64 = 130;

pub struct Frontend {
    pub file: PathBuf,
    pub config: EngineConfig,
    /// Use TCP on the loopback interface instead of a Unix-domain socket.
    pub tcp: bool,
    /// Start suspended and step interactively.
    pub step: bool,
    /// Print every execution message.
    pub show_events: bool,
}

enum Backend {
    Thread(BackendThread),
    Process(BackendProcess),
}

impl Backend {
    fn connect(&self) -> ProtocolResult<Client> {
        match self {
            Backend::Thread(backend) => backend.connect(),
            Backend::Process(backend) => backend.connect(),
        }
    }
}

impl Frontend {
    /// Run the program to its end and return its exit code.
    pub fn run(&self) -> CliResult<i64> {
        let source = read_file(&self.file)?;
        // Holds the socket of a Unix-domain endpoint.
        let (endpoint, _socket_dir) = self.endpoint()?;
        let backend = self.start_backend(endpoint)?;
        let mut client = backend.connect()?;

        let kind = if self.step { CommandKind::Debug } else { CommandKind::Run };
        let command = Command::new(kind)
            .with_arguments([format!("file={}", self.file.display())])
            .with_payload(source.clone());

        let mut printer = Printer {
            source: &source,
            file: self.file.display().to_string(),
            show_events: self.show_events,
        };
        let mut response = client.request(command, |frame| printer.frame(frame))?;
        let code = loop {
            match response {
                Response::Result(Reply::Exited { status }) => break printer.exit_code(status),
                Response::Result(Reply::Suspended {
                    reason,
                    function,
                    index,
                    location,
                    depth,
                }) => {
                    eprintln!("[{:?}] {}:{:04} at {} (depth {})", reason, function, index, location, depth);
                    let next = prompt()?;
                    response = client.request(next, |frame| printer.frame(frame))?;
                }
                Response::Result(Reply::Breakpoint { line }) => {
                    eprintln!("breakpoint at line {}", line);
                    let next = prompt()?;
                    response = client.request(next, |frame| printer.frame(frame))?;
                }
                Response::Result(other) => {
                    return Err(CliError::UnexpectedReply {
                        received: format!("{:?}", other),
                    })
                }
                Response::Error(failure) => {
                    if failure.diagnostics.is_empty() {
                        eprintln!("error: {}", failure.message);
                    }
                    for diagnostic in &failure.diagnostics {
                        printer.render(diagnostic);
                    }
                    break 1;
                }
            }
        };
        if let Err(err) = client.close() {
            log::debug!(target: "ipc", "closing the session: {}", err);
        }
        Ok(code)
    }

    fn endpoint(&self) -> CliResult<(Endpoint, Option<TempDir>)> {
        if self.tcp || cfg!(not(unix)) {
            return Ok((Endpoint::loopback(), None));
        }
        let dir = tempfile::Builder::new()
            .prefix("scribble")
            .tempdir()
            .map_err(|source| CliError::Io {
                path: std::env::temp_dir(),
                operation: "create a socket directory in",
                source,
            })?;
        Ok((Endpoint::Unix(dir.path().join("backend.sock")), Some(dir)))
    }

    fn start_backend(&self, endpoint: Endpoint) -> CliResult<Backend> {
        if self.config.threaded {
            let backend = spawn_backend_thread(endpoint, Arc::new(self.config.clone()))?;
            log::debug!(target: "ipc", "backend thread on {}", backend.endpoint());
            Ok(Backend::Thread(backend))
        } else {
            let executable = backend_executable()?;
            let backend = spawn_backend_process(&executable, &endpoint, &self.config.to_options())?;
            log::debug!(target: "ipc", "backend process {} on {}", backend.id(), backend.endpoint());
            Ok(Backend::Process(backend))
        }
    }
}

/// Ask what to do next while the program is suspended.
fn prompt() -> CliResult<Command> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        eprint!("(step) ");
        let _ = io::stderr().flush();
        line.clear();
        let read = stdin.lock().read_line(&mut line).map_err(|source| CliError::Io {
            path: PathBuf::from("<stdin>"),
            operation: "read",
            source,
        })?;
        if read == 0 {
            return Ok(Command::new(CommandKind::Stop));
        }
        match parse_prompt(line.trim()) {
            Some(command) => return Ok(command),
            None => eprintln!("<enter>/s step, n step over, o run to return, c continue, b <line> breakpoint, q stop"),
        }
    }
}

fn parse_prompt(input: &str) -> Option<Command> {
    let mut words = input.split_whitespace();
    let kind = match words.next() {
        None | Some("s") | Some("step") => CommandKind::Step,
        Some("n") | Some("next") => CommandKind::StepOver,
        Some("o") | Some("out") => CommandKind::RunToReturn,
        Some("c") | Some("continue") => CommandKind::Continue,
        Some("q") | Some("quit") => CommandKind::Stop,
        Some("b") | Some("break") => {
            let line: usize = words.next()?.parse().ok()?;
            return Some(Command::new(CommandKind::Break).with_arguments([format!("line={}", line)]));
        }
        Some(_) => return None,
    };
    Some(Command::new(kind))
}

struct Printer<'a> {
    source: &'a str,
    file: String,
    show_events: bool,
}

impl Printer<'_> {
    fn frame(&mut self, frame: &Frame) {
        match frame {
            Frame::Output(text) => {
                let mut stdout = io::stdout().lock();
                let _ = stdout.write_all(text.as_bytes());
                let _ = stdout.flush();
            }
            Frame::Event(message) => {
                if self.show_events {
                    eprintln!("{}", message);
                } else {
                    log::debug!(target: "engine", "{}", message);
                }
            }
            Frame::Warning(diagnostic) => self.render(diagnostic),
            other => log::debug!(target: "ipc", "ignoring {}", other.describe()),
        }
    }

    /// Print `diagnostic`, with a source excerpt when it points into the
    /// file being run.
    fn render(&self, diagnostic: &Diagnostic) {
        match &diagnostic.location {
            Some(location) if *location.file == *self.file => {
                let report = miette::Report::new(Report::new(self.source, diagnostic.clone()));
                eprintln!("{:?}", report);
            }
            Some(location) => eprintln!("{}: {}", location, diagnostic),
            None => eprintln!("{}", diagnostic),
        }
    }

    fn exit_code(&self, status: ExitStatus) -> i64 {
        match status {
            ExitStatus::Code(code) => code,
            ExitStatus::Stopped => STOPPED_EXIT_CODE,
            ExitStatus::Error(diagnostic) => {
                self.render(&diagnostic);
                1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_commands() {
        let command = |input| parse_prompt(input).map(|c| c.command);
        assert_eq!(command(""), Some("step".to_string()));
        assert_eq!(command("n"), Some("step-over".to_string()));
        assert_eq!(command("o"), Some("run-to-return".to_string()));
        assert_eq!(command("c"), Some("continue".to_string()));
        assert_eq!(command("q"), Some("stop".to_string()));
        assert_eq!(command("x"), None);
        assert_eq!(command("b"), None);

        let command = parse_prompt("b 12").unwrap();
        assert_eq!(command.command, "break");
        assert_eq!(command.arguments, vec!["line=12".to_string()]);
    }

    #[test]
    fn test_threaded_run() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("answer.scribble");
        std::fs::write(&file, "func main(): i32 { return 40 + 2; }").unwrap();
        let frontend = Frontend {
            file,
            config: EngineConfig {
                threaded: true,
                ..EngineConfig::default()
            },
            tcp: true,
            step: false,
            show_events: false,
        };
        assert_eq!(frontend.run().unwrap(), 42);
    }
}
