//! Shared code of the `scribble` and `scribble-backend` executables.

pub mod error;
pub mod frontend;
pub mod utils;

pub use error::{CliError, CliResult};
pub use frontend::Frontend;
