//! Starting a backend, in this process or in a separate one.
//!
//! Either way the caller only gets the endpoint back once the backend's
//! socket is bound, so connecting right away never races the listener.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{self, Child, ChildStdout, Stdio};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

use scribble_engine::{EngineConfig, OptionStore};

use crate::client::Client;
use crate::error::{ProtocolError, ProtocolResult};
use crate::server::Server;
use crate::transport::Endpoint;

/// First word of the line a backend process prints once it is listening.
pub const READY: &str = "READY";

/// The line `scribble-backend` prints after binding `endpoint`.
pub fn ready_line(endpoint: &Endpoint) -> String {
    format!("{} {}", READY, endpoint)
}

/// A backend server running on a thread of this process.
pub struct BackendThread {
    endpoint: Endpoint,
    _handle: thread::JoinHandle<ProtocolResult<()>>,
}

impl BackendThread {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn connect(&self) -> ProtocolResult<Client> {
        Client::connect(&self.endpoint)
    }
}

/// Start a server on a new thread and return once it is listening.
pub fn spawn_backend_thread(endpoint: Endpoint, config: Arc<EngineConfig>) -> ProtocolResult<BackendThread> {
    let ready: Arc<(Mutex<Option<ProtocolResult<Endpoint>>>, Condvar)> = Arc::new((Mutex::new(None), Condvar::new()));
    let signal = Arc::clone(&ready);

    let handle = thread::Builder::new()
        .name("scribble-backend".to_string())
        .spawn(move || {
            let (state, condvar) = &*signal;
            match Server::bind(&endpoint, config) {
                Ok(server) => {
                    *state.lock() = Some(Ok(server.local_endpoint().clone()));
                    condvar.notify_all();
                    server.serve()
                }
                Err(err) => {
                    *state.lock() = Some(Err(err.clone()));
                    condvar.notify_all();
                    Err(err)
                }
            }
        })
        .map_err(|err| ProtocolError::Spawn {
            message: err.to_string(),
        })?;

    let (state, condvar) = &*ready;
    let mut state = state.lock();
    let endpoint = loop {
        if let Some(bound) = state.take() {
            break bound?;
        }
        condvar.wait(&mut state);
    };
    log::debug!(target: "ipc", "backend thread ready on {}", endpoint);
    Ok(BackendThread {
        endpoint,
        _handle: handle,
    })
}

/// A `scribble-backend` child process. Killed when dropped.
pub struct BackendProcess {
    child: Child,
    endpoint: Endpoint,
    _stdout: BufReader<ChildStdout>,
}

impl BackendProcess {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn connect(&self) -> ProtocolResult<Client> {
        Client::connect(&self.endpoint)
    }
}

impl Drop for BackendProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Run the backend executable at `program` on `endpoint` and wait for it to
/// report that it is listening. `options` are passed on as
/// `--key[=value]` flags.
pub fn spawn_backend_process(program: &Path, endpoint: &Endpoint, options: &OptionStore) -> ProtocolResult<BackendProcess> {
    let spawn_error = |message: String| ProtocolError::Spawn { message };

    let mut child = process::Command::new(program)
        .arg(endpoint.to_string())
        .args(options.to_pairs().iter().map(|pair| format!("--{}", pair)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|err| spawn_error(format!("{}: {}", program.display(), err)))?;
    log::debug!(target: "ipc", "started backend process {}", child.id());

    let Some(stdout) = child.stdout.take() else {
        let _ = child.kill();
        return Err(spawn_error("the backend's output is not captured".to_string()));
    };
    let mut stdout = BufReader::new(stdout);
    let mut line = String::new();
    let endpoint = loop {
        line.clear();
        let read = match stdout.read_line(&mut line) {
            Ok(read) => read,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err.into());
            }
        };
        if read == 0 {
            let status = child.wait().map(|s| s.to_string()).unwrap_or_default();
            return Err(spawn_error(format!("the backend exited before it was ready ({})", status)));
        }
        if let Some(rest) = line.trim().strip_prefix(READY) {
            match rest.trim().parse::<Endpoint>() {
                Ok(endpoint) => break endpoint,
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(err);
                }
            }
        }
    };

    log::debug!(target: "ipc", "backend process {} ready on {}", child.id(), endpoint);
    Ok(BackendProcess {
        child,
        endpoint,
        _stdout: stdout,
    })
}
