use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};

use scribble_cli::utils::{exit_byte, find_config, init_logger};
use scribble_cli::{CliResult, Frontend};
use scribble_engine::{EngineConfig, OptionStore};

#[derive(Parser, Debug)]
#[command(name = "scribble")]
#[command(about = "Compile and run Scribble programs", long_about = None)]
struct Args {
    /// Source file to run
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Run the backend in a thread instead of a separate process
    #[arg(long)]
    threaded: bool,

    /// Talk to the backend over TCP instead of a Unix-domain socket
    #[arg(long)]
    tcp: bool,

    /// Report every stage
    #[arg(long)]
    debug: bool,

    /// Print every execution message
    #[arg(long)]
    trace: bool,

    /// Link and execute instead of interpreting the IR
    #[arg(long)]
    execute: bool,

    /// Log the IR listing
    #[arg(long)]
    list_ir: bool,

    /// Start suspended and step through the program
    #[arg(long)]
    step: bool,

    /// Configuration file (defaults to the nearest scribble.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

fn load_config(args: &Args) -> CliResult<EngineConfig> {
    let base = match args.config.clone().or_else(|| find_config(&args.file)) {
        Some(path) => {
            log::debug!("using configuration {}", path.display());
            EngineConfig::from_file(&path)?
        }
        None => EngineConfig::default(),
    };

    let mut options = OptionStore::new();
    let flags = [
        ("threaded", args.threaded),
        ("debug", args.debug),
        ("trace", args.trace),
        ("execute", args.execute),
        ("list-ir", args.list_ir),
    ];
    for (key, set) in flags {
        if set {
            options.set(key, None);
        }
    }
    if let Some(dir) = args.file.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        options.set("include", Some(dir.display().to_string()));
    }
    let (config, errors) = base.with_options(&options);
    for err in errors {
        log::warn!("{}", err);
    }
    Ok(config)
}

fn run(args: Args) -> CliResult<i64> {
    let config = load_config(&args)?;
    init_logger(args.verbose.log_level_filter(), config.trace, config.debug);
    let frontend = Frontend {
        file: args.file,
        show_events: config.trace,
        config,
        tcp: args.tcp,
        step: args.step,
    };
    frontend.run()
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(code) => ExitCode::from(exit_byte(code)),
        Err(err) => {
            init_logger(log::LevelFilter::Warn, false, false);
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::FAILURE
        }
    }
}
