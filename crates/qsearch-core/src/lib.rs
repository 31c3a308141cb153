//! # q-search Core Library
//!
//! A checkpointed, resumable engine for parameter-sweep optimization campaigns: one
//! expensive optimization per value of a swept model parameter, fanned out over a
//! fixed pool of workers, with every solution persisted exactly once.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture so that the sweep machinery
//! never depends on what the model or optimizer actually compute.
//!
//! - **[`core`]: The Foundation.** The opaque [`BaseModel`](core::model::BaseModel)
//!   contract, the JSON [`Bundle`](core::model::bundle::Bundle) model and its loader,
//!   and the [`Optimizer`](core::backend::Optimizer) boundary to the external solver.
//!
//! - **[`engine`]: The Logic Core.** Grid generation, the checkpoint store, the
//!   process-safe sweep journal, the per-unit solver adapter, and the worker pool
//!   dispatcher.
//!
//! - **[`workflows`]: The Public API.** The sweep controller that drives one dispatch
//!   per outer-fixed value, and the summary of a finished (or partial) campaign.

pub mod core;
pub mod engine;
pub mod workflows;
