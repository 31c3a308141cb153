use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::{AppConfig, OptimizerCommand};
use crate::cli::SearchArgs;
use crate::error::{CliError, Result};
use qsearch::engine::config as core_config;
use std::str::FromStr;

/// Layers the configuration of a `search` run: CLI flags win over `-S` overrides,
/// which win over the config file, which wins over built-in defaults.
pub fn build_config(args: &SearchArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let model_path = args
        .model
        .clone()
        .or(file_config.model.take())
        .ok_or_else(|| required("--path", "model"))?;

    let grid_file = file_config.grid.take().unwrap_or_default();
    let q_min = args
        .q_min
        .or(grid_file.min)
        .ok_or_else(|| required("--q-min", "grid.min"))?;
    let q_max = args
        .q_max
        .or(grid_file.max)
        .ok_or_else(|| required("--q-max", "grid.max"))?;
    let q_step = args
        .q_step
        .or(grid_file.step)
        .ok_or_else(|| required("--q-step", "grid.step"))?;

    let solver_file = file_config.solver.take().unwrap_or_default();
    let program = args
        .optimizer
        .clone()
        .or(solver_file.program)
        .ok_or_else(|| required("--optimizer", "solver.program"))?;
    let optimizer_args = if args.optimizer_args.is_empty() {
        solver_file.args.unwrap_or_default()
    } else {
        args.optimizer_args.clone()
    };
    let max_iterations = args
        .nm_maxiter
        .or(solver_file.max_iterations)
        .unwrap_or(defaults.max_iterations);
    let attach_goodness_of_fit = if args.no_goodness_of_fit {
        false
    } else {
        solver_file
            .goodness_of_fit
            .unwrap_or(defaults.attach_goodness_of_fit)
    };

    let sweep_file = file_config.sweep.take().unwrap_or_default();
    let workers = args
        .n_procs
        .or(sweep_file.workers)
        .unwrap_or(defaults.workers);
    let output_root = match args.solution_dir.clone().or(sweep_file.output_root) {
        Some(root) => root,
        None => std::env::current_dir()?,
    };

    let outer_file = file_config.outer.take().unwrap_or_default();
    let outer_values = if args.incl.is_empty() {
        outer_file.values.unwrap_or_default()
    } else {
        args.incl.clone()
    };

    let mut builder = core_config::SweepConfigBuilder::new()
        .grid(q_min, q_max, q_step)
        .target_parameter(
            sweep_file
                .target_parameter
                .unwrap_or(defaults.target_parameter),
        )
        .method(solver_file.method.unwrap_or(defaults.method))
        .max_iterations(max_iterations)
        .attach_goodness_of_fit(attach_goodness_of_fit)
        .workers(workers)
        .output_root(output_root)
        .sweep_directory(sweep_file.sweep_directory.unwrap_or(defaults.sweep_directory))
        .disabled_inputs(sweep_file.disabled_inputs.unwrap_or(defaults.disabled_inputs))
        .outer_parameter(outer_file.parameter.unwrap_or(defaults.outer_parameter))
        .outer_prefix(outer_file.prefix.unwrap_or(defaults.outer_prefix))
        .outer_values(outer_values);
    if let Some(fit_parameters) = solver_file.fit_parameters {
        builder = builder.fit_parameters(fit_parameters);
    }

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        model_path,
        optimizer: OptimizerCommand {
            program,
            args: optimizer_args,
        },
        core_config,
    })
}

fn required(flag: &str, key: &str) -> CliError {
    CliError::Config(format!(
        "A value for '{}' is required either via the {} argument or in the config file.",
        key, flag
    ))
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();

        match key {
            "model" => config.model = Some(value_str.into()),
            "grid.min" => {
                config.grid.get_or_insert_with(Default::default).min =
                    Some(parse_value(key, value_str, "float")?);
            }
            "grid.max" => {
                config.grid.get_or_insert_with(Default::default).max =
                    Some(parse_value(key, value_str, "float")?);
            }
            "grid.step" => {
                config.grid.get_or_insert_with(Default::default).step =
                    Some(parse_value(key, value_str, "float")?);
            }
            "solver.method" => {
                config.solver.get_or_insert_with(Default::default).method =
                    Some(value_str.to_string());
            }
            "solver.max-iterations" => {
                config
                    .solver
                    .get_or_insert_with(Default::default)
                    .max_iterations = Some(parse_value(key, value_str, "integer")?);
            }
            "solver.fit-parameters" => {
                config
                    .solver
                    .get_or_insert_with(Default::default)
                    .fit_parameters = Some(parse_list(value_str));
            }
            "solver.goodness-of-fit" => {
                config
                    .solver
                    .get_or_insert_with(Default::default)
                    .goodness_of_fit = Some(parse_value(key, value_str, "boolean")?);
            }
            "solver.program" => {
                config.solver.get_or_insert_with(Default::default).program =
                    Some(value_str.into());
            }
            "sweep.target-parameter" => {
                config
                    .sweep
                    .get_or_insert_with(Default::default)
                    .target_parameter = Some(value_str.to_string());
            }
            "sweep.workers" => {
                config.sweep.get_or_insert_with(Default::default).workers =
                    Some(parse_value(key, value_str, "integer")?);
            }
            "sweep.output-root" => {
                config.sweep.get_or_insert_with(Default::default).output_root =
                    Some(value_str.into());
            }
            "sweep.sweep-directory" => {
                config
                    .sweep
                    .get_or_insert_with(Default::default)
                    .sweep_directory = Some(value_str.to_string());
            }
            "sweep.disabled-inputs" => {
                config
                    .sweep
                    .get_or_insert_with(Default::default)
                    .disabled_inputs = Some(parse_list(value_str));
            }
            "outer.parameter" => {
                config.outer.get_or_insert_with(Default::default).parameter =
                    Some(value_str.to_string());
            }
            "outer.prefix" => {
                config.outer.get_or_insert_with(Default::default).prefix =
                    Some(value_str.to_string());
            }
            "outer.values" => {
                let values = parse_list(value_str)
                    .iter()
                    .map(|v| parse_value(key, v, "float"))
                    .collect::<Result<Vec<f64>>>()?;
                config.outer.get_or_insert_with(Default::default).values = Some(values);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
