use std::path::PathBuf;

use miette::Diagnostic;
use scribble_engine::ConfigError;
use scribble_net::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("failed to {operation} {}", path.display())]
    #[diagnostic(code(scribble::cli::io))]
    Io {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("no backend executable at {}", path.display())]
    #[diagnostic(
        code(scribble::cli::backend_not_found),
        help("build `scribble-backend`, point SCRIBBLE_BACKEND at it, or pass --threaded")
    )]
    BackendNotFound { path: PathBuf },

    #[error("the backend answered with {received}")]
    #[diagnostic(code(scribble::cli::unexpected_reply))]
    UnexpectedReply { received: String },

    #[error("usage: {message}")]
    #[diagnostic(code(scribble::cli::usage))]
    Usage { message: String },
}

pub type CliResult<T> = Result<T, CliError>;
