//! # Core Module
//!
//! The foundation layer of q-search: everything the sweep engine needs to know about
//! the outside world, expressed as narrow contracts.
//!
//! ## Architecture
//!
//! - **Model Contract** ([`model`]) - The opaque [`BaseModel`](model::BaseModel) trait,
//!   the model [`Topology`](model::Topology), and the JSON parameter bundle
//! - **File I/O** ([`io`]) - Loading model documents, transparently decompressing gzip
//! - **Optimizer Boundary** ([`backend`]) - The [`Optimizer`](backend::Optimizer) trait
//!   and the external-command implementation used by the CLI
//!
//! The engine only ever clones a model, sets one parameter on the clone, and hands the
//! clone to an optimizer; it never interprets the fit.

pub mod backend;
pub mod io;
pub mod model;
