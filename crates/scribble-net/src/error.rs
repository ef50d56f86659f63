use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed message: {message}")]
    #[diagnostic(code(scribble::ipc::malformed))]
    Malformed { message: String },

    #[error("unknown command '{command}'")]
    #[diagnostic(
        code(scribble::ipc::unknown_command),
        help("commands: hello, compile, run, debug, step, step-over, run-to-return, continue, break, stop, goodbye")
    )]
    UnknownCommand { command: String },

    #[error("invalid arguments for '{command}': {message}")]
    #[diagnostic(code(scribble::ipc::arguments))]
    InvalidArguments { command: String, message: String },

    #[error("transport failure: {message}")]
    #[diagnostic(code(scribble::ipc::transport))]
    Transport { message: String },

    #[error("the connection was closed")]
    #[diagnostic(code(scribble::ipc::closed))]
    Closed,

    #[error("expected {expected}, received {received}")]
    #[diagnostic(code(scribble::ipc::unexpected))]
    Unexpected { expected: &'static str, received: String },

    #[error("failed to start the backend: {message}")]
    #[diagnostic(code(scribble::ipc::spawn))]
    Spawn { message: String },
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Transport {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            ProtocolError::Transport {
                message: err.to_string(),
            }
        } else {
            ProtocolError::Malformed {
                message: err.to_string(),
            }
        }
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
