use thiserror::Error;

use super::checkpoint::CheckpointError;
use super::config::ConfigError;
use super::grid::GridError;
use super::journal::JournalError;
use crate::core::io::bundle::BundleLoadError;
use crate::core::model::ModelError;

/// Failures that abort a sweep before (or instead of) dispatching its units.
///
/// Errors of individual units never surface here; they become
/// [`UnitOutcome::Failed`](super::solver::UnitOutcome::Failed).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid grid: {0}")]
    Grid(#[from] GridError),

    #[error("Failed to load model: {0}")]
    ModelLoad(#[from] BundleLoadError),

    #[error("Failed to configure model: {0}")]
    Model(#[from] ModelError),

    #[error("Checkpoint store error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Sweep journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Failed to export summary: {0}")]
    Export(#[from] csv::Error),

    #[error("Worker pool failure: {0}")]
    WorkerPool(String),
}
