use qsearch::engine::config as core_config;
use std::thread;

pub struct DefaultsConfig {
    pub method: String,
    pub max_iterations: usize,
    pub workers: usize,
    pub sweep_directory: String,
    pub target_parameter: String,
    pub outer_parameter: String,
    pub outer_prefix: String,
    pub disabled_inputs: Vec<String>,
    pub attach_goodness_of_fit: bool,
}

/// Half of the available logical cores, at least one.
fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            method: core_config::DEFAULT_SOLVER_METHOD.to_string(),
            max_iterations: core_config::DEFAULT_MAX_ITERATIONS,
            workers: default_workers(),
            sweep_directory: core_config::DEFAULT_SWEEP_DIRECTORY.to_string(),
            target_parameter: core_config::DEFAULT_TARGET_PARAMETER.to_string(),
            outer_parameter: core_config::DEFAULT_OUTER_PARAMETER.to_string(),
            outer_prefix: core_config::DEFAULT_OUTER_PREFIX.to_string(),
            disabled_inputs: core_config::DEFAULT_DISABLED_INPUTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            attach_goodness_of_fit: true,
        }
    }
}
