//! # Engine Module
//!
//! The sweep engine: everything between "here is a grid of parameter values" and "every
//! grid value has a persisted solution, a logged failure, or a logged skip".
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Sweep settings, builder, and fit-parameter selection
//! - **Grid Generation** ([`grid`]) - Deterministic, restartable parameter grids
//! - **Checkpointing** ([`checkpoint`]) - Create-only solution artifacts keyed by grid value
//! - **Journal** ([`journal`]) - The lock-protected append log shared by all workers
//! - **Solver Adapter** ([`solver`]) - One sweep unit: skip, solve, persist, or fail in isolation
//! - **Dispatch** ([`dispatch`]) - The fixed-size, pull-based worker pool
//! - **Progress Monitoring** ([`progress`]) - Progress events for user feedback
//! - **Error Handling** ([`error`]) - Fatal, run-aborting errors
//!
//! Per-unit failures never surface as [`error::EngineError`]; they are recorded in the
//! journal and returned as [`solver::UnitOutcome::Failed`].

pub mod checkpoint;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod grid;
pub mod journal;
pub mod progress;
pub mod solver;

#[cfg(test)]
pub(crate) mod testing;
