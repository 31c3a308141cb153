use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const ARTIFACT_EXTENSION: &str = "sol";
const KEY_DECIMALS: usize = 4;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Solution '{key}' already exists at '{path}'", path = path.display())]
    AlreadyExists { key: UnitKey, path: PathBuf },

    #[error("Checkpoint I/O error for '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize solution '{key}': {source}")]
    Serialization {
        key: UnitKey,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed solution artifact '{path}': {source}", path = path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Deterministic identifier of one grid value inside a sweep directory.
///
/// The key is the value printed with four decimals (`0.32` becomes `0.3200`), so any
/// two grid values that differ in the first four decimals map to distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitKey(String);

impl UnitKey {
    pub fn for_value(value: f64) -> Self {
        Self(format!("{:.*}", KEY_DECIMALS, value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, ARTIFACT_EXTENSION)
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The outer-fixed parameter a solution was computed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OuterValue {
    pub parameter: String,
    pub value: f64,
}

/// The persisted result of one solved sweep unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SolutionArtifact {
    pub key: String,
    pub parameter: String,
    pub grid_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer: Option<OuterValue>,
    #[serde(default)]
    pub goodness_of_fit: Option<f64>,
    pub method: String,
    #[serde(default)]
    pub iterations: Option<usize>,
    #[serde(default)]
    pub fitted_parameters: BTreeMap<String, f64>,
    #[serde(default)]
    pub solver_state: serde_json::Value,
}

/// Create-only storage of [`SolutionArtifact`]s, one file per [`UnitKey`].
///
/// Existence checks only stat the file system. Writes go to a hidden temporary file
/// in the same directory and are moved into place without clobbering, so a reader
/// never observes a partial artifact and an existing artifact is never replaced.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    directory: PathBuf,
}

impl CheckpointStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn key_for(grid_value: f64) -> UnitKey {
        UnitKey::for_value(grid_value)
    }

    pub fn ensure_directory(&self) -> Result<(), CheckpointError> {
        fs::create_dir_all(&self.directory).map_err(|e| CheckpointError::Io {
            path: self.directory.clone(),
            source: e,
        })
    }

    pub fn path_for(&self, key: &UnitKey) -> PathBuf {
        self.directory.join(key.file_name())
    }

    pub fn exists(&self, key: &UnitKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Writes `artifact` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::AlreadyExists`] if an artifact for `key` is already
    /// present; the existing file is left untouched.
    pub fn persist(
        &self,
        key: &UnitKey,
        artifact: &SolutionArtifact,
    ) -> Result<PathBuf, CheckpointError> {
        let target = self.path_for(key);
        if target.exists() {
            return Err(CheckpointError::AlreadyExists {
                key: key.clone(),
                path: target,
            });
        }
        self.ensure_directory()?;

        let io_error = |source: io::Error| CheckpointError::Io {
            path: target.clone(),
            source,
        };

        let mut pending = tempfile::Builder::new()
            .prefix(".pending-")
            .suffix(".tmp")
            .tempfile_in(&self.directory)
            .map_err(io_error)?;
        {
            let mut writer = BufWriter::new(pending.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, artifact).map_err(|e| {
                CheckpointError::Serialization {
                    key: key.clone(),
                    source: e,
                }
            })?;
            writer.write_all(b"\n").map_err(io_error)?;
            writer.flush().map_err(io_error)?;
        }
        pending.as_file().sync_all().map_err(io_error)?;

        match pending.persist_noclobber(&target) {
            Ok(_) => {
                debug!("Persisted solution {} to {}", key, target.display());
                Ok(target)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                Err(CheckpointError::AlreadyExists {
                    key: key.clone(),
                    path: target,
                })
            }
            Err(e) => Err(io_error(e.error)),
        }
    }

    pub fn read(&self, key: &UnitKey) -> Result<SolutionArtifact, CheckpointError> {
        Self::read_path(&self.path_for(key))
    }

    pub fn read_path(path: &Path) -> Result<SolutionArtifact, CheckpointError> {
        let file = File::open(path).map_err(|e| CheckpointError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| CheckpointError::Malformed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Lists every artifact file in the directory, sorted by file name.
    ///
    /// A directory that does not exist yet holds no artifacts.
    pub fn artifacts(&self) -> Result<Vec<PathBuf>, CheckpointError> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CheckpointError::Io {
                    path: self.directory.clone(),
                    source: e,
                });
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CheckpointError::Io {
                path: self.directory.clone(),
                source: e,
            })?;
            let path = entry.path();
            let is_artifact = path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(ARTIFACT_EXTENSION);
            if is_artifact {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}
