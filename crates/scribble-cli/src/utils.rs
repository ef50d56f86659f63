use std::path::{Path, PathBuf};

use log::LevelFilter;
use scribble_engine::CONFIG_FILE_NAME;

use crate::error::{CliError, CliResult};

/// Environment variable naming the backend executable to spawn.
pub const BACKEND_ENV: &str = "SCRIBBLE_BACKEND";

/// Finds the nearest `scribble.toml`, searching upwards from `start_path`.
pub fn find_config(start_path: &Path) -> Option<PathBuf> {
    let mut current = if start_path.is_dir() {
        start_path.to_path_buf()
    } else {
        start_path.parent().map_or_else(|| start_path.to_path_buf(), Path::to_path_buf)
    };
    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

pub fn read_file(path: &Path) -> CliResult<String> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        operation: "read",
        source,
    })
}

/// `scribble-backend` next to the running executable, unless
/// `SCRIBBLE_BACKEND` says otherwise.
pub fn backend_executable() -> CliResult<PathBuf> {
    let path = match std::env::var_os(BACKEND_ENV) {
        Some(path) => PathBuf::from(path),
        None => {
            let current = std::env::current_exe().map_err(|source| CliError::Io {
                path: PathBuf::from("."),
                operation: "locate",
                source,
            })?;
            current.with_file_name(format!("scribble-backend{}", std::env::consts::EXE_SUFFIX))
        }
    };
    if path.is_file() {
        Ok(path)
    } else {
        Err(CliError::BackendNotFound { path })
    }
}

/// Install the logger. `trace` and `debug` raise the level chosen on the
/// command line.
pub fn init_logger(level: LevelFilter, trace: bool, debug: bool) {
    let level = if trace {
        LevelFilter::Trace
    } else if debug {
        level.max(LevelFilter::Debug)
    } else {
        level
    };
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .try_init();
}

/// Process exit status for a program's exit code. Only the low byte
/// survives, so a failing code whose low byte is zero becomes 1.
pub fn exit_byte(code: i64) -> u8 {
    match (code & 0xff) as u8 {
        0 if code != 0 => 1,
        byte => byte,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_byte_never_turns_failure_into_success() {
        assert_eq!(exit_byte(0), 0);
        assert_eq!(exit_byte(3), 3);
        assert_eq!(exit_byte(130), 130);
        assert_eq!(exit_byte(256), 1);
        assert_eq!(exit_byte(-256), 1);
        assert_eq!(exit_byte(259), 3);
        assert_eq!(exit_byte(-1), 255);
    }

    #[test]
    fn test_find_config_searches_upwards() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("src/nested");
        std::fs::create_dir_all(&nested).unwrap();
        let source = nested.join("main.scribble");
        std::fs::write(&source, "func main() {}").unwrap();
        assert_eq!(find_config(&source), None);

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "execute = true\n").unwrap();
        assert_eq!(find_config(&source), Some(dir.path().join(CONFIG_FILE_NAME)));
    }
}
