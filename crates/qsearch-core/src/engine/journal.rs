use chrono::Local;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const JOURNAL_FILE_NAME: &str = ".log";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Journal I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Append-only log shared by every worker writing into one sweep directory.
///
/// Each entry is a single line `[timestamp] [pid/worker] message`. The whole line is
/// written and flushed while holding the journal lock, so lines from concurrent
/// workers never interleave and the file is totally ordered by lock acquisition.
#[derive(Debug)]
pub struct SweepJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl SweepJournal {
    /// Opens (or creates) the journal inside `directory`, creating the directory too.
    pub fn open(directory: &Path) -> Result<Self, JournalError> {
        let path = directory.join(JOURNAL_FILE_NAME);
        let io_error = |source: io::Error| JournalError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(directory).map_err(io_error)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, message: &str) -> Result<(), JournalError> {
        let line = format_line(message);
        {
            let mut file = self.file.lock();
            file.write_all(line.as_bytes())
                .and_then(|_| file.flush())
                .map_err(|e| JournalError::Io {
                    path: self.path.clone(),
                    source: e,
                })?;
        }
        debug!(target: "qsearch::journal", "{}", line.trim_end());
        Ok(())
    }

    /// Appends `message` and echoes it to the console log at `info` level.
    pub fn append_and_echo(&self, message: &str) -> Result<(), JournalError> {
        self.append(message)?;
        info!("{}", message);
        Ok(())
    }

    /// Like [`append`](Self::append), but a failed write is only reported as a
    /// warning. Used where the outcome of a unit must not depend on the journal.
    pub fn record(&self, message: &str) {
        if let Err(e) = self.append(message) {
            warn!("Could not write to sweep journal: {}", e);
        }
    }
}

fn format_line(message: &str) -> String {
    let current = std::thread::current();
    let worker = current.name().unwrap_or("main");
    let message = message.replace(['\r', '\n'], " ");
    format!(
        "[{}] [{}/{}] {}\n",
        Local::now().format(TIMESTAMP_FORMAT),
        std::process::id(),
        worker,
        message
    )
}
