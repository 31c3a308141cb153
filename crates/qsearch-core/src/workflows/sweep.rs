use crate::core::backend::Optimizer;
use crate::core::io::bundle::load_bundle;
use crate::core::model::BaseModel;
use crate::core::model::bundle::Bundle;
use crate::engine::checkpoint::{CheckpointStore, OuterValue};
use crate::engine::config::{ConfigError, SweepConfig};
use crate::engine::dispatch::{Dispatcher, UnitReport};
use crate::engine::error::EngineError;
use crate::engine::journal::SweepJournal;
use crate::engine::progress::ProgressReporter;
use crate::engine::solver::{SolverAdapter, UnitOutcome, UnitSettings};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// The outcome of the inner sweep for one outer-fixed value.
#[derive(Debug, Clone, PartialEq)]
pub struct OuterReport {
    pub outer_value: Option<f64>,
    pub directory: PathBuf,
    pub units: Vec<UnitReport>,
}

impl OuterReport {
    pub fn solved(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Solved { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(UnitOutcome::is_failed)
    }

    fn count(&self, predicate: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.units.iter().filter(|u| predicate(&u.outcome)).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub outers: Vec<OuterReport>,
}

impl SweepReport {
    pub fn total_failed(&self) -> usize {
        self.outers.iter().map(OuterReport::failed).sum()
    }

    pub fn total_units(&self) -> usize {
        self.outers.iter().map(|o| o.units.len()).sum()
    }
}

/// Loads the base model from `model_path` and executes the configured sweep on it.
///
/// A model that cannot be located, recognized, or parsed aborts the run before any
/// directory is created or any worker is started.
#[instrument(skip_all, name = "sweep_workflow")]
pub fn run<O>(
    model_path: &Path,
    config: &SweepConfig,
    optimizer: &O,
    reporter: &ProgressReporter,
) -> Result<SweepReport, EngineError>
where
    O: Optimizer<Bundle>,
{
    config.grid.validate()?;
    reporter.phase_start("Loading model");
    let base = load_bundle(model_path)?;
    reporter.phase_finish();

    let report = execute(&base, config, optimizer, reporter)?;
    info!(
        "Sweep complete: {} units across {} sweep directories, {} failed.",
        report.total_units(),
        report.outers.len(),
        report.total_failed()
    );
    Ok(report)
}

/// Drives one dispatch per outer value (or a single dispatch without an outer sweep).
///
/// For each outer value the controller's working copy of the base is re-seeded with
/// that value, its inputs are re-enabled, and the inner grid is dispatched into the
/// value's own directory. Outer values never share a directory, so each one resumes
/// independently of the others.
pub fn execute<M, O>(
    base: &M,
    config: &SweepConfig,
    optimizer: &O,
    reporter: &ProgressReporter,
) -> Result<SweepReport, EngineError>
where
    M: BaseModel,
    O: Optimizer<M>,
{
    let grid = config.grid.generate()?;
    let outer_values: Vec<Option<f64>> = match &config.outer {
        Some(outer) => outer.values.iter().copied().map(Some).collect(),
        None => vec![None],
    };
    let dispatcher = Dispatcher::new(config.workers);
    let mut working = base.clone();
    let mut report = SweepReport::default();

    for outer_value in outer_values {
        let fixed = match (&config.outer, outer_value) {
            (Some(outer), Some(value)) => Some(OuterValue {
                parameter: outer.parameter.clone(),
                value,
            }),
            _ => None,
        };
        let phase = match &fixed {
            Some(f) => format!(
                "Sweeping {} at {}={}",
                config.target_parameter, f.parameter, f.value
            ),
            None => format!("Sweeping {}", config.target_parameter),
        };
        reporter.phase_start(phase.as_str());

        if let Some(f) = &fixed {
            working.set_parameter(&f.parameter, f.value)?;
        }
        working.enable_inputs(&config.disabled_inputs)?;

        let solver = config.solver_config(working.topology());
        if solver.fit_parameters.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "fit-parameters",
                reason: "no free parameters remain once the outer parameter is fixed"
                    .to_string(),
            }
            .into());
        }

        let directory = config.sweep_directory_for(outer_value);
        let store = CheckpointStore::new(&directory);
        store.ensure_directory()?;
        let journal = SweepJournal::open(&directory)?;
        journal.append_and_echo(&format!(
            "{} over {} grid values ({} to {}, step {}) with {} workers, fitting [{}]",
            phase,
            grid.len(),
            config.grid.min,
            config.grid.max,
            config.grid.step,
            dispatcher.workers(),
            solver.fit_parameters.join(", ")
        ))?;

        let settings = UnitSettings {
            target_parameter: config.target_parameter.clone(),
            solver,
            attach_goodness_of_fit: config.solver.attach_goodness_of_fit,
            outer: fixed,
        };
        let adapter = SolverAdapter::new(optimizer, &store, &journal, &settings);
        let units = dispatcher.run(&working, &grid, &adapter, reporter)?;

        let outer_report = OuterReport {
            outer_value,
            directory,
            units,
        };
        journal.append_and_echo(&format!(
            "Finished: {} solved, {} skipped, {} failed",
            outer_report.solved(),
            outer_report.skipped(),
            outer_report.failed()
        ))?;
        reporter.phase_finish();
        report.outers.push(outer_report);
    }

    Ok(report)
}
