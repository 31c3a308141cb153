use crate::engine::checkpoint::{CheckpointError, CheckpointStore, SolutionArtifact};
use crate::engine::error::EngineError;
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// One persisted solution, flattened for display and CSV export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SummaryRow {
    pub sweep_directory: String,
    pub outer_parameter: Option<String>,
    pub outer_value: Option<f64>,
    pub parameter: String,
    pub grid_value: f64,
    pub goodness_of_fit: Option<f64>,
    pub iterations: Option<usize>,
}

impl SummaryRow {
    fn from_artifact(directory: &Path, artifact: SolutionArtifact) -> Self {
        let (outer_parameter, outer_value) = match artifact.outer {
            Some(outer) => (Some(outer.parameter), Some(outer.value)),
            None => (None, None),
        };
        Self {
            sweep_directory: directory.display().to_string(),
            outer_parameter,
            outer_value,
            parameter: artifact.parameter,
            grid_value: artifact.grid_value,
            goodness_of_fit: artifact.goodness_of_fit,
            iterations: artifact.iterations,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepSummary {
    /// Sorted by outer value, then grid value.
    pub rows: Vec<SummaryRow>,
    /// Artifact files that exist but could not be read.
    pub unreadable: Vec<PathBuf>,
}

impl SweepSummary {
    /// The row with the lowest finite goodness of fit, if any.
    pub fn best(&self) -> Option<&SummaryRow> {
        self.rows
            .iter()
            .filter(|r| r.goodness_of_fit.is_some_and(f64::is_finite))
            .min_by(|a, b| score(a).total_cmp(&score(b)))
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), EngineError> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(csv::Error::from)?;
        debug!("Wrote {} summary rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}

/// Finds the sweep directories of a campaign rooted at `root`.
///
/// Recognized are `root` itself when it already holds artifacts, `root/<sweep_directory>`,
/// and `root/<outer>/<sweep_directory>` for every immediate subdirectory.
pub fn discover_sweep_directories(
    root: &Path,
    sweep_directory: &str,
) -> Result<Vec<PathBuf>, EngineError> {
    let io_error = |source: std::io::Error| CheckpointError::Io {
        path: root.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    if !CheckpointStore::new(root).artifacts()?.is_empty() {
        found.push(root.to_path_buf());
    }
    let direct = root.join(sweep_directory);
    if direct.is_dir() {
        found.push(direct);
    }

    let mut nested = Vec::new();
    for entry in fs::read_dir(root).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let candidate = entry.path().join(sweep_directory);
        if entry.path().is_dir() && candidate.is_dir() {
            nested.push(candidate);
        }
    }
    nested.sort();
    found.extend(nested);
    Ok(found)
}

/// Reads every artifact in `directories` into a single summary.
///
/// Malformed artifacts are listed in [`SweepSummary::unreadable`] instead of failing
/// the whole summary.
#[instrument(skip_all, name = "summary_workflow")]
pub fn summarize(directories: &[PathBuf]) -> Result<SweepSummary, EngineError> {
    let mut summary = SweepSummary::default();

    for directory in directories {
        let store = CheckpointStore::new(directory);
        for path in store.artifacts()? {
            match CheckpointStore::read_path(&path) {
                Ok(artifact) => summary
                    .rows
                    .push(SummaryRow::from_artifact(directory, artifact)),
                Err(e) => {
                    warn!("Skipping unreadable artifact: {}", e);
                    summary.unreadable.push(path);
                }
            }
        }
    }

    summary.rows.sort_by(|a, b| {
        compare_outer(a.outer_value, b.outer_value)
            .then_with(|| a.grid_value.total_cmp(&b.grid_value))
    });
    Ok(summary)
}

fn score(row: &SummaryRow) -> f64 {
    row.goodness_of_fit.unwrap_or(f64::INFINITY)
}

fn compare_outer(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (a, b) => a.is_some().cmp(&b.is_some()),
    }
}
