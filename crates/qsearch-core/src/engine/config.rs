use std::path::{Path, PathBuf};
use thiserror::Error;

pub use crate::core::backend::SolverConfig;
pub use crate::core::model::Topology;
pub use crate::engine::grid::GridSpec;

pub const DEFAULT_SOLVER_METHOD: &str = "nelder-mead";
pub const DEFAULT_MAX_ITERATIONS: usize = 250;
pub const DEFAULT_SWEEP_DIRECTORY: &str = "q-solutions";
pub const DEFAULT_TARGET_PARAMETER: &str = "q";
pub const DEFAULT_OUTER_PARAMETER: &str = "incl@binary";
pub const DEFAULT_OUTER_PREFIX: &str = "incl";
pub const DEFAULT_DISABLED_INPUTS: &[&str] = &["mesh01"];

pub const CONTACT_FIT_PARAMETERS: &[&str] = &["incl@binary", "teffratio", "fillout_factor"];
pub const DETACHED_FIT_PARAMETERS: &[&str] = &[
    "teffratio@binary@orbit@component",
    "requivsumfrac@binary@orbit@component",
    "requivratio",
    "esinw@binary@orbit@component",
    "ecosw@binary@orbit@component",
    "incl@binary",
];

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

impl Topology {
    /// The parameters an optimizer may vary for a model of this topology.
    pub fn fit_parameters(&self) -> &'static [&'static str] {
        match self {
            Topology::Contact => CONTACT_FIT_PARAMETERS,
            Topology::Detached => DETACHED_FIT_PARAMETERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitParameters {
    /// Chosen from the model's [`Topology`] when the sweep starts.
    ByTopology,
    Explicit(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    pub method: String,
    pub max_iterations: usize,
    pub fit_parameters: FitParameters,
    /// Run the goodness-of-fit computation after each fit and record its value.
    pub attach_goodness_of_fit: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            method: DEFAULT_SOLVER_METHOD.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            fit_parameters: FitParameters::ByTopology,
            attach_goodness_of_fit: true,
        }
    }
}

/// A secondary parameter held fixed for one full inner sweep, once per value.
#[derive(Debug, Clone, PartialEq)]
pub struct OuterSweep {
    pub parameter: String,
    /// Name used for the per-value directory, `<prefix>-<value>`.
    pub directory_prefix: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub grid: GridSpec,
    pub target_parameter: String,
    pub solver: SolverSettings,
    pub outer: Option<OuterSweep>,
    pub workers: usize,
    pub output_root: PathBuf,
    pub sweep_directory: String,
    pub disabled_inputs: Vec<String>,
}

impl SweepConfig {
    /// Directory holding the artifacts and journal for one outer value.
    ///
    /// Without an outer sweep this is `<root>/<sweep_directory>`; otherwise it is
    /// `<root>/<prefix>-<value>/<sweep_directory>`, with the value always printed with a
    /// fractional part (`incl-85.0`).
    pub fn sweep_directory_for(&self, outer_value: Option<f64>) -> PathBuf {
        match (&self.outer, outer_value) {
            (Some(outer), Some(value)) => self
                .output_root
                .join(format!("{}-{:?}", outer.directory_prefix, value))
                .join(&self.sweep_directory),
            _ => self.output_root.join(&self.sweep_directory),
        }
    }

    /// Builds the optimizer configuration for a model of the given topology.
    ///
    /// When an outer parameter is held fixed it is removed from the free set.
    pub fn solver_config(&self, topology: Topology) -> SolverConfig {
        let mut fit_parameters: Vec<String> = match &self.solver.fit_parameters {
            FitParameters::ByTopology => topology
                .fit_parameters()
                .iter()
                .map(|p| p.to_string())
                .collect(),
            FitParameters::Explicit(parameters) => parameters.clone(),
        };
        if let Some(outer) = &self.outer {
            fit_parameters.retain(|p| p != &outer.parameter);
        }

        SolverConfig {
            method: self.solver.method.clone(),
            max_iterations: self.solver.max_iterations,
            fit_parameters,
        }
    }
}

#[derive(Default)]
pub struct SweepConfigBuilder {
    grid: Option<GridSpec>,
    target_parameter: Option<String>,
    method: Option<String>,
    max_iterations: Option<usize>,
    fit_parameters: Option<Vec<String>>,
    attach_goodness_of_fit: Option<bool>,
    outer_parameter: Option<String>,
    outer_prefix: Option<String>,
    outer_values: Vec<f64>,
    workers: Option<usize>,
    output_root: Option<PathBuf>,
    sweep_directory: Option<String>,
    disabled_inputs: Option<Vec<String>>,
}

impl SweepConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grid(mut self, min: f64, max: f64, step: f64) -> Self {
        self.grid = Some(GridSpec::new(min, max, step));
        self
    }
    pub fn target_parameter(mut self, twig: impl Into<String>) -> Self {
        self.target_parameter = Some(twig.into());
        self
    }
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn fit_parameters(mut self, parameters: Vec<String>) -> Self {
        self.fit_parameters = Some(parameters);
        self
    }
    pub fn attach_goodness_of_fit(mut self, attach: bool) -> Self {
        self.attach_goodness_of_fit = Some(attach);
        self
    }
    pub fn outer_parameter(mut self, twig: impl Into<String>) -> Self {
        self.outer_parameter = Some(twig.into());
        self
    }
    pub fn outer_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.outer_prefix = Some(prefix.into());
        self
    }
    pub fn outer_values(mut self, values: Vec<f64>) -> Self {
        self.outer_values = values;
        self
    }
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }
    pub fn output_root(mut self, root: impl AsRef<Path>) -> Self {
        self.output_root = Some(root.as_ref().to_path_buf());
        self
    }
    pub fn sweep_directory(mut self, name: impl Into<String>) -> Self {
        self.sweep_directory = Some(name.into());
        self
    }
    pub fn disabled_inputs(mut self, names: Vec<String>) -> Self {
        self.disabled_inputs = Some(names);
        self
    }

    pub fn build(self) -> Result<SweepConfig, ConfigError> {
        let grid = self.grid.ok_or(ConfigError::MissingParameter("grid"))?;
        grid.validate().map_err(|e| ConfigError::InvalidValue {
            name: "grid",
            reason: e.to_string(),
        })?;

        let workers = self.workers.ok_or(ConfigError::MissingParameter("workers"))?;
        if workers == 0 {
            return Err(ConfigError::InvalidValue {
                name: "workers",
                reason: "at least one worker is required".to_string(),
            });
        }

        let max_iterations = self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS);
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max-iterations",
                reason: "must be positive".to_string(),
            });
        }

        let fit_parameters = match self.fit_parameters {
            Some(parameters) if parameters.is_empty() => {
                return Err(ConfigError::InvalidValue {
                    name: "fit-parameters",
                    reason: "an explicit fit-parameter list must not be empty".to_string(),
                });
            }
            Some(parameters) => FitParameters::Explicit(parameters),
            None => FitParameters::ByTopology,
        };

        let outer = Self::build_outer(
            self.outer_parameter,
            self.outer_prefix,
            self.outer_values,
        )?;

        let sweep_directory = self
            .sweep_directory
            .unwrap_or_else(|| DEFAULT_SWEEP_DIRECTORY.to_string());
        if sweep_directory.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "sweep-directory",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(SweepConfig {
            grid,
            target_parameter: self
                .target_parameter
                .unwrap_or_else(|| DEFAULT_TARGET_PARAMETER.to_string()),
            solver: SolverSettings {
                method: self
                    .method
                    .unwrap_or_else(|| DEFAULT_SOLVER_METHOD.to_string()),
                max_iterations,
                fit_parameters,
                attach_goodness_of_fit: self.attach_goodness_of_fit.unwrap_or(true),
            },
            outer,
            workers,
            output_root: self.output_root.unwrap_or_else(|| PathBuf::from(".")),
            sweep_directory,
            disabled_inputs: self.disabled_inputs.unwrap_or_else(|| {
                DEFAULT_DISABLED_INPUTS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            }),
        })
    }

    fn build_outer(
        parameter: Option<String>,
        prefix: Option<String>,
        values: Vec<f64>,
    ) -> Result<Option<OuterSweep>, ConfigError> {
        if values.is_empty() {
            return Ok(None);
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidValue {
                name: "outer-values",
                reason: format!("{bad} is not a finite number"),
            });
        }
        for (i, value) in values.iter().enumerate() {
            if values[..i].contains(value) {
                return Err(ConfigError::InvalidValue {
                    name: "outer-values",
                    reason: format!("{value} is listed more than once"),
                });
            }
        }

        Ok(Some(OuterSweep {
            parameter: parameter.unwrap_or_else(|| DEFAULT_OUTER_PARAMETER.to_string()),
            directory_prefix: prefix.unwrap_or_else(|| DEFAULT_OUTER_PREFIX.to_string()),
            values,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> SweepConfigBuilder {
        SweepConfigBuilder::new().grid(0.30, 0.34, 0.02).workers(2)
    }

    #[test]
    fn build_applies_defaults() {
        let config = builder().build().unwrap();
        assert_eq!(config.target_parameter, "q");
        assert_eq!(config.solver, SolverSettings::default());
        assert_eq!(config.sweep_directory, "q-solutions");
        assert_eq!(config.disabled_inputs, vec!["mesh01".to_string()]);
        assert!(config.outer.is_none());
    }

    #[test]
    fn build_requires_grid_and_workers() {
        assert_eq!(
            SweepConfigBuilder::new().workers(1).build(),
            Err(ConfigError::MissingParameter("grid"))
        );
        assert_eq!(
            SweepConfigBuilder::new().grid(0.1, 0.2, 0.1).build(),
            Err(ConfigError::MissingParameter("workers"))
        );
    }

    #[test]
    fn build_rejects_invalid_values() {
        assert!(matches!(
            builder().workers(0).build(),
            Err(ConfigError::InvalidValue { name: "workers", .. })
        ));
        assert!(matches!(
            builder().grid(0.4, 0.3, 0.01).build(),
            Err(ConfigError::InvalidValue { name: "grid", .. })
        ));
        assert!(matches!(
            builder().grid(0.30, 0.3002, 0.00005).build(),
            Err(ConfigError::InvalidValue { name: "grid", reason }) if reason.contains("0.3000")
        ));
        assert!(matches!(
            builder().outer_values(vec![80.0, 80.0]).build(),
            Err(ConfigError::InvalidValue { name: "outer-values", .. })
        ));
        assert!(matches!(
            builder().outer_values(vec![f64::NAN]).build(),
            Err(ConfigError::InvalidValue { name: "outer-values", .. })
        ));
        assert!(matches!(
            builder().fit_parameters(vec![]).build(),
            Err(ConfigError::InvalidValue { name: "fit-parameters", .. })
        ));
    }

    #[test]
    fn sweep_directory_layout() {
        let config = builder().output_root("/data/run").build().unwrap();
        assert_eq!(
            config.sweep_directory_for(None),
            PathBuf::from("/data/run/q-solutions")
        );

        let config = builder()
            .output_root("/data/run")
            .outer_values(vec![85.0, 87.5])
            .build()
            .unwrap();
        assert_eq!(
            config.sweep_directory_for(Some(85.0)),
            PathBuf::from("/data/run/incl-85.0/q-solutions")
        );
        assert_eq!(
            config.sweep_directory_for(Some(87.5)),
            PathBuf::from("/data/run/incl-87.5/q-solutions")
        );
    }

    #[test]
    fn fit_parameters_follow_topology() {
        let config = builder().build().unwrap();
        assert_eq!(
            config.solver_config(Topology::Contact).fit_parameters,
            vec!["incl@binary", "teffratio", "fillout_factor"]
        );
        assert_eq!(
            config.solver_config(Topology::Detached).fit_parameters.len(),
            6
        );
    }

    #[test]
    fn fixed_outer_parameter_is_not_fitted() {
        let config = builder().outer_values(vec![85.0]).build().unwrap();
        let contact = config.solver_config(Topology::Contact);
        assert_eq!(contact.fit_parameters, vec!["teffratio", "fillout_factor"]);
        let detached = config.solver_config(Topology::Detached);
        assert_eq!(detached.fit_parameters.len(), 5);
        assert!(!detached.fit_parameters.contains(&"incl@binary".to_string()));
        assert_eq!(contact.max_iterations, 250);
        assert_eq!(contact.method, "nelder-mead");
    }

    #[test]
    fn explicit_fit_parameters_override_topology() {
        let config = builder()
            .fit_parameters(vec!["teffratio".to_string()])
            .build()
            .unwrap();
        assert_eq!(
            config.solver_config(Topology::Contact).fit_parameters,
            vec!["teffratio"]
        );
    }
}
