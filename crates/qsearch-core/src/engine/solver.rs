use super::checkpoint::{CheckpointError, CheckpointStore, OuterValue, SolutionArtifact, UnitKey};
use super::journal::SweepJournal;
use crate::core::backend::{Optimizer, SolveError, SolverConfig};
use crate::core::model::{BaseModel, ModelError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

/// How a single sweep unit ended.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Solved {
        path: PathBuf,
        goodness_of_fit: Option<f64>,
    },
    /// An artifact already existed; nothing was computed.
    Skipped { path: PathBuf },
    Failed { reason: String },
}

impl UnitOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, UnitOutcome::Failed { .. })
    }
}

/// Per-sweep settings shared by every unit of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSettings {
    pub target_parameter: String,
    pub solver: SolverConfig,
    pub attach_goodness_of_fit: bool,
    pub outer: Option<OuterValue>,
}

#[derive(Debug, Error)]
enum UnitError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Runs one sweep unit end to end: checkpoint check, parameter assignment,
/// optimization, optional goodness-of-fit, artifact persistence.
///
/// Every error and panic raised while solving is contained here and reported as
/// [`UnitOutcome::Failed`]; nothing is retried.
pub struct SolverAdapter<'a, O> {
    optimizer: &'a O,
    store: &'a CheckpointStore,
    journal: &'a SweepJournal,
    settings: &'a UnitSettings,
}

impl<'a, O> SolverAdapter<'a, O> {
    pub fn new(
        optimizer: &'a O,
        store: &'a CheckpointStore,
        journal: &'a SweepJournal,
        settings: &'a UnitSettings,
    ) -> Self {
        Self {
            optimizer,
            store,
            journal,
            settings,
        }
    }

    pub fn store(&self) -> &CheckpointStore {
        self.store
    }

    pub fn journal(&self) -> &SweepJournal {
        self.journal
    }

    pub fn solve<M>(&self, model: M, grid_value: f64) -> UnitOutcome
    where
        M: BaseModel,
        O: Optimizer<M>,
    {
        self.solve_with(|| model, grid_value)
    }

    /// Like [`solve`](Self::solve), but obtains the working model from `checkout` only
    /// once the unit is known to need solving. A panic inside `checkout` fails this
    /// unit like any other solver panic.
    pub fn solve_with<M, F>(&self, checkout: F, grid_value: f64) -> UnitOutcome
    where
        M: BaseModel,
        O: Optimizer<M>,
        F: FnOnce() -> M,
    {
        let key = CheckpointStore::key_for(grid_value);
        let label = format!("{}={}", self.settings.target_parameter, key);

        if self.store.exists(&key) {
            self.journal.record(&format!("{label} already solved, skipping"));
            return UnitOutcome::Skipped {
                path: self.store.path_for(&key),
            };
        }

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.try_solve(checkout(), grid_value, &key, &label)
        }));

        let reason = match attempt {
            Ok(Ok(outcome)) => return outcome,
            Ok(Err(err)) => err.to_string(),
            Err(payload) => format!("solver panicked: {}", panic_message(payload.as_ref())),
        };
        warn!("Could not solve for {}: {}", label, reason);
        self.journal
            .record(&format!("Could not solve for {label} | {reason}"));
        UnitOutcome::Failed { reason }
    }

    fn try_solve<M>(
        &self,
        mut model: M,
        grid_value: f64,
        key: &UnitKey,
        label: &str,
    ) -> Result<UnitOutcome, UnitError>
    where
        M: BaseModel,
        O: Optimizer<M>,
    {
        model.set_parameter(&self.settings.target_parameter, grid_value)?;
        self.journal.record(&format!("Solving for {label}"));

        let outcome = self.optimizer.optimize(&model, &self.settings.solver)?;

        let goodness_of_fit = if self.settings.attach_goodness_of_fit {
            for (twig, value) in &outcome.fitted_parameters {
                model.set_parameter(twig, *value)?;
            }
            Some(self.optimizer.goodness_of_fit(&model)?)
        } else {
            outcome.objective
        };

        let artifact = SolutionArtifact {
            key: key.to_string(),
            parameter: self.settings.target_parameter.clone(),
            grid_value,
            outer: self.settings.outer.clone(),
            goodness_of_fit,
            method: self.settings.solver.method.clone(),
            iterations: outcome.iterations,
            fitted_parameters: outcome.fitted_parameters,
            solver_state: outcome.state,
        };

        match self.store.persist(key, &artifact) {
            Ok(path) => {
                let score = goodness_of_fit
                    .map(|g| g.to_string())
                    .unwrap_or_else(|| "n/a".to_string());
                self.journal
                    .record(&format!("Solved for {label} | goodness-of-fit={score}"));
                Ok(UnitOutcome::Solved {
                    path,
                    goodness_of_fit,
                })
            }
            Err(CheckpointError::AlreadyExists { path, .. }) => {
                debug!("{} was persisted concurrently; keeping the existing artifact", label);
                self.journal
                    .record(&format!("{label} already solved, skipping"));
                Ok(UnitOutcome::Skipped { path })
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::{Topology, DEFAULT_SOLVER_METHOD};
    use crate::engine::testing::{ScriptedOptimizer, binary_bundle};
    use std::fs;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        _dir: TempDir,
        store: CheckpointStore,
        journal: SweepJournal,
        settings: UnitSettings,
    }

    fn fixture(attach_goodness_of_fit: bool) -> Fixture {
        let dir = tempdir().unwrap();
        let directory = dir.path().join("q-solutions");
        let journal = SweepJournal::open(&directory).unwrap();
        Fixture {
            store: CheckpointStore::new(&directory),
            journal,
            settings: UnitSettings {
                target_parameter: "q".to_string(),
                solver: SolverConfig {
                    method: DEFAULT_SOLVER_METHOD.to_string(),
                    max_iterations: 250,
                    fit_parameters: Topology::Contact
                        .fit_parameters()
                        .iter()
                        .map(|p| p.to_string())
                        .collect(),
                },
                attach_goodness_of_fit,
                outer: None,
            },
            _dir: dir,
        }
    }

    fn journal_text(fx: &Fixture) -> String {
        fs::read_to_string(fx.journal.path()).unwrap()
    }

    #[test]
    fn solve_persists_artifact_with_adopted_goodness_of_fit() {
        let fx = fixture(true);
        let optimizer = ScriptedOptimizer::default();
        let adapter = SolverAdapter::new(&optimizer, &fx.store, &fx.journal, &fx.settings);

        let outcome = adapter.solve(binary_bundle(true), 0.32);

        let path = fx.store.path_for(&UnitKey::for_value(0.32));
        assert_eq!(
            outcome,
            UnitOutcome::Solved {
                path: path.clone(),
                goodness_of_fit: Some(1.32)
            }
        );
        let artifact = CheckpointStore::read_path(&path).unwrap();
        assert_eq!(artifact.key, "0.3200");
        assert_eq!(artifact.grid_value, 0.32);
        assert_eq!(artifact.goodness_of_fit, Some(1.32));
        assert_eq!(artifact.solver_state["q"], 0.32);
        assert_eq!(optimizer.goodness_calls(), 1);
        assert!(journal_text(&fx).contains("Solved for q=0.3200"));
    }

    #[test]
    fn without_goodness_of_fit_the_objective_is_recorded() {
        let fx = fixture(false);
        let optimizer = ScriptedOptimizer::default();
        let adapter = SolverAdapter::new(&optimizer, &fx.store, &fx.journal, &fx.settings);

        let outcome = adapter.solve(binary_bundle(true), 0.5);

        assert!(matches!(
            outcome,
            UnitOutcome::Solved { goodness_of_fit: Some(g), .. } if g == 50.0
        ));
        assert_eq!(optimizer.goodness_calls(), 0);
    }

    #[test]
    fn existing_artifact_is_skipped_without_solving() {
        let fx = fixture(true);
        let optimizer = ScriptedOptimizer::default();
        let adapter = SolverAdapter::new(&optimizer, &fx.store, &fx.journal, &fx.settings);
        let path = fx.store.path_for(&UnitKey::for_value(0.32));
        fs::write(&path, "precomputed").unwrap();

        let outcome = adapter.solve(binary_bundle(true), 0.32);

        assert_eq!(outcome, UnitOutcome::Skipped { path: path.clone() });
        assert_eq!(optimizer.optimize_calls(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "precomputed");
        assert!(journal_text(&fx).contains("q=0.3200 already solved"));
    }

    #[test]
    fn solver_error_becomes_failed_outcome() {
        let fx = fixture(true);
        let optimizer = ScriptedOptimizer::failing_at(&[0.32]);
        let adapter = SolverAdapter::new(&optimizer, &fx.store, &fx.journal, &fx.settings);

        let outcome = adapter.solve(binary_bundle(true), 0.32);

        assert!(outcome.is_failed());
        assert!(!fx.store.exists(&UnitKey::for_value(0.32)));
        let journal = journal_text(&fx);
        assert!(journal.contains("Could not solve for q=0.3200 | Optimizer did not converge"));
    }

    #[test]
    fn solver_panic_is_contained() {
        let fx = fixture(true);
        let optimizer = ScriptedOptimizer::panicking_at(&[0.32]);
        let adapter = SolverAdapter::new(&optimizer, &fx.store, &fx.journal, &fx.settings);

        let outcome = adapter.solve(binary_bundle(true), 0.32);

        match outcome {
            UnitOutcome::Failed { reason } => assert!(reason.contains("simplex collapsed")),
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[test]
    fn unknown_target_parameter_fails_the_unit() {
        let mut fx = fixture(true);
        fx.settings.target_parameter = "massratio".to_string();
        let optimizer = ScriptedOptimizer::default();
        let adapter = SolverAdapter::new(&optimizer, &fx.store, &fx.journal, &fx.settings);

        let outcome = adapter.solve(binary_bundle(true), 0.32);

        assert!(outcome.is_failed());
        assert_eq!(optimizer.optimize_calls(), 0);
    }
}
