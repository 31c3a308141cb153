//! # Optimizer Boundary
//!
//! The expensive optimization procedure is an external collaborator. The engine hands
//! it a configured model clone plus a [`SolverConfig`] and receives a [`FitOutcome`]
//! back; anything it raises is a [`SolveError`] scoped to that single sweep unit.

use crate::core::model::{BaseModel, ModelError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod command;

/// What the optimizer is asked to do for one sweep unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SolverConfig {
    pub method: String,
    pub max_iterations: usize,
    pub fit_parameters: Vec<String>,
}

/// The converged result of one optimization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitOutcome {
    /// Final values of the free parameters, keyed by twig.
    #[serde(default)]
    pub fitted_parameters: BTreeMap<String, f64>,
    #[serde(default)]
    pub iterations: Option<usize>,
    /// Objective value reported by the optimizer itself, if any.
    #[serde(default)]
    pub objective: Option<f64>,
    /// Opaque optimizer state needed to reconstruct the fit.
    #[serde(default)]
    pub state: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("Optimizer did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    #[error("Invalid solver configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Optimizer backend failed: {0}")]
    Backend(String),
}

/// An optimization procedure the sweep engine can delegate to.
///
/// Implementations are shared by every worker of a pool, hence `Send + Sync`. Each
/// call may take arbitrary wall-clock time.
pub trait Optimizer<M: BaseModel>: Send + Sync {
    /// Fits the free parameters named in `config` on `model`.
    fn optimize(&self, model: &M, config: &SolverConfig) -> Result<FitOutcome, SolveError>;

    /// Computes the goodness of fit (e.g. chi-square) of `model` as it stands.
    fn goodness_of_fit(&self, model: &M) -> Result<f64, SolveError>;
}
