//! # Model Contract
//!
//! The sweep engine treats the domain model as an opaque, capability-bearing value.
//! All it ever asks of a model is captured by [`BaseModel`]: a deep clone, a
//! parameter mutator applied to that clone, a way to enable the model's inputs, and
//! enough structural insight ([`Topology`]) to pick which parameters the optimizer
//! is allowed to fit.

use thiserror::Error;

pub mod bundle;

/// Structural variant of a binary-system model.
///
/// The topology decides which sub-parameters are free during a fit: a contact system
/// shares a common envelope and is fitted through its fillout factor, while a
/// detached (or semi-detached) system is fitted through its radii and eccentricity
/// projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Contact,
    Detached,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("Parameter '{twig}' is ambiguous: it matches {matches} entries")]
    AmbiguousParameter { twig: String, matches: usize },

    #[error("Invalid value {value} for parameter '{twig}'")]
    InvalidValue { twig: String, value: f64 },
}

/// The narrow capability set the sweep engine needs from a domain model.
///
/// `Clone` must produce a deep, independent copy: every worker receives its own clone
/// and mutates it freely, so no two clones may share mutable state.
pub trait BaseModel: Clone + Send + Sync {
    /// Inspects the model structure to determine its [`Topology`].
    fn topology(&self) -> Topology;

    /// Reads the current value of the parameter addressed by `twig`.
    fn parameter(&self, twig: &str) -> Result<f64, ModelError>;

    /// Sets the parameter addressed by `twig` to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownParameter`] if `twig` addresses nothing,
    /// [`ModelError::AmbiguousParameter`] if it addresses more than one entry, and
    /// [`ModelError::InvalidValue`] if `value` is not finite.
    fn set_parameter(&mut self, twig: &str, value: f64) -> Result<(), ModelError>;

    /// Enables every input dataset except the ones named in `disabled`.
    fn enable_inputs(&mut self, disabled: &[String]) -> Result<(), ModelError>;
}
