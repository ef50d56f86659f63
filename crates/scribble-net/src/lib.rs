//! # Scribble Net
//!
//! The wire between a frontend and a backend.
//!
//! Frames are JSON documents, one per line, over a Unix-domain socket or TCP.
//! A frontend sends [`Command`]s; for each command the backend streams any
//! number of events, program output and warnings, then exactly one
//! [`Response`].
//!
//! Every accepted connection is a session with its own thread and its own
//! [`BackendConnection`](scribble_engine::BackendConnection). Sessions share
//! nothing but the process-wide native bridge, and a broken connection only
//! ends its own session.
//!
//! A backend runs either on a thread of the frontend
//! ([`spawn_backend_thread`]) or as a `scribble-backend` process
//! ([`spawn_backend_process`]).

mod client;
mod codec;
mod deploy;
mod error;
mod protocol;
mod server;
mod transport;

pub use client::Client;
pub use codec::{decode, encode, FrameReader, FrameWriter};
pub use deploy::{ready_line, spawn_backend_process, spawn_backend_thread, BackendProcess, BackendThread, READY};
pub use error::{ProtocolError, ProtocolResult};
pub use protocol::{Command, CommandKind, Failure, Frame, Reply, Response, PROTOCOL_VERSION};
pub use server::Server;
pub use transport::{Endpoint, Listener, Stream};
