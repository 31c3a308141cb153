//! # Workflows Module
//!
//! High-level entry points that drive complete q-search campaigns.
//!
//! ## Overview
//!
//! A workflow owns everything a caller should not have to think about: loading the
//! base model, deciding which parameters are free, laying out the output directories,
//! and turning the engine's per-unit outcomes into a report.
//!
//! ## Architecture
//!
//! - **Sweep Workflow** ([`sweep`]) - Loads a model and runs the inner grid once per
//!   outer-fixed value, each into its own resumable directory.
//! - **Summary Workflow** ([`summary`]) - Collects persisted solutions of a finished
//!   or interrupted campaign, finds the best fit, and exports CSV.

pub mod summary;
pub mod sweep;
