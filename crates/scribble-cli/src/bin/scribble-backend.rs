//! `scribble-backend <socket-path|host:port> [--option[=value]...]`
//!
//! Binds the endpoint, prints `READY <endpoint>` and serves sessions until
//! killed.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use scribble_cli::utils::init_logger;
use scribble_cli::{CliError, CliResult};
use scribble_engine::{EngineConfig, OptionStore};
use scribble_net::{ready_line, Endpoint, Server};

fn serve() -> CliResult<()> {
    let (options, positional) = OptionStore::from_flags(std::env::args().skip(1));
    let [endpoint] = positional.as_slice() else {
        return Err(CliError::Usage {
            message: "scribble-backend <socket-path|host:port> [--option[=value]...]".to_string(),
        });
    };
    let (config, errors) = EngineConfig::default().with_options(&options);
    init_logger(log::LevelFilter::Warn, config.trace, config.debug);
    for err in errors {
        log::warn!("{}", err);
    }

    let endpoint: Endpoint = endpoint.parse()?;
    let server = Server::bind(&endpoint, Arc::new(config))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", ready_line(server.local_endpoint()))
        .and_then(|()| stdout.flush())
        .map_err(|source| CliError::Io {
            path: "<stdout>".into(),
            operation: "write to",
            source,
        })?;
    drop(stdout);
    server.serve()?;
    Ok(())
}

fn main() -> ExitCode {
    match serve() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            init_logger(log::LevelFilter::Warn, false, false);
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::FAILURE
        }
    }
}
