//! Operational helpers: logging setup and log directory handling.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};

use nettray_types::{config::OpsConfig, NetTrayError, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_FILE_NAME: &str = "nettray.log";

/// Installs the global subscriber. With `log_dir` set, output goes to
/// `<log_dir>/nettray.log` so it does not draw over the terminal UI.
pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = build_filter(&config.log_level)?;

    match &config.log_dir {
        Some(dir) => {
            let file = open_log_file(dir)?;
            fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|err| ops_error(format!("tracing init error: {err}")))?;
        }
        None => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|err| ops_error(format!("tracing init error: {err}")))?;
        }
    }
    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| ops_error(format!("failed to create log filter: {err}")))
}

pub fn ensure_log_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    std::fs::create_dir_all(&dir)
        .map_err(|err| ops_error(format!("failed to create log dir {:?}: {err}", dir)))?;
    info!("Log directory ready at {:?}", dir);
    Ok(dir)
}

fn open_log_file(dir: &str) -> Result<File> {
    let path = ensure_log_dir(dir)?.join(LOG_FILE_NAME);
    append_to(&path)
}

fn append_to(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| ops_error(format!("failed to open log file {:?}: {err}", path)))
}

pub fn ops_error(message: impl Into<String>) -> NetTrayError {
    NetTrayError::Ops(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_falls_back_to_info() {
        assert!(build_filter("not a directive [").is_ok());
        assert!(build_filter("nettray_monitor=debug").is_ok());
    }

    #[test]
    fn log_dir_and_file_are_created() {
        let dir = std::env::temp_dir().join("nettray-ops-test");
        let _ = std::fs::remove_dir_all(&dir);
        let dir_str = dir.to_string_lossy().to_string();

        let file = open_log_file(&dir_str).expect("open log file");
        drop(file);
        assert!(dir.join(LOG_FILE_NAME).exists());
        std::fs::remove_dir_all(&dir).expect("cleanup log dir");
    }
}
