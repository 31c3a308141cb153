use crate::error::{CliError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_subscriber::{
    Layer,
    filter::{EnvFilter, LevelFilter},
    fmt,
    prelude::*,
    registry::LookupSpan,
};

fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbosity) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, 2) => LevelFilter::DEBUG,
        (false, _) => LevelFilter::TRACE,
    }
}

fn env_filter(verbosity: u8, quiet: bool) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level_filter(verbosity, quiet).into())
        .from_env_lossy()
}

/// Plain-text layer for `--log-file`: targets, thread ids and names, no colors.
fn file_layer<S>(path: &Path) -> Result<impl Layer<S> + use<S>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let file = File::create(path).map_err(CliError::Io)?;
    Ok(fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true))
}

/// Installs the global subscriber.
///
/// `RUST_LOG` directives refine the level chosen by `-v`/`--quiet`, e.g.
/// `RUST_LOG=qsearch::journal=debug` mirrors every journal line.
pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let file = log_file.as_deref().map(file_layer).transpose()?;

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(verbosity >= 2)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter(verbosity, quiet))
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| CliError::Other(anyhow::anyhow!("Failed to install logger: {}", e)))
}
