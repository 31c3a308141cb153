use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::solver::{SolverAdapter, UnitOutcome, panic_message};
use crate::core::backend::Optimizer;
use crate::core::model::BaseModel;
use crossbeam_channel::unbounded;
use parking_lot::Mutex;
use std::thread;
use tracing::{debug, info, warn};

const LOST_UNIT_REASON: &str = "worker terminated before reporting an outcome";

/// Read-only access to the base model for the duration of one dispatch.
///
/// Workers never touch the base directly; they take a deep copy through
/// [`checkout`](Self::checkout), which clones under the model's clone lock.
pub struct SharedModel<'m, M> {
    model: &'m M,
    clone_lock: Mutex<()>,
}

impl<'m, M: BaseModel> SharedModel<'m, M> {
    pub fn new(model: &'m M) -> Self {
        Self {
            model,
            clone_lock: Mutex::new(()),
        }
    }

    pub fn checkout(&self) -> M {
        let _guard = self.clone_lock.lock();
        self.model.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitReport {
    pub grid_value: f64,
    pub outcome: UnitOutcome,
}

/// Fans sweep units out to a fixed pool of worker threads.
///
/// All grid values are queued up front, in grid order, on one shared channel; each
/// worker pulls the next value as soon as it is idle. Results flow back on a second
/// channel and progress advances once per completed unit.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    workers: usize,
}

impl Dispatcher {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Solves every value of `grid` against clones of `base`.
    ///
    /// Returns one report per grid value, in grid order. Unit failures are part of the
    /// reports; an error is returned only if no worker thread could be started.
    pub fn run<M, O>(
        &self,
        base: &M,
        grid: &[f64],
        adapter: &SolverAdapter<'_, O>,
        reporter: &ProgressReporter,
    ) -> Result<Vec<UnitReport>, EngineError>
    where
        M: BaseModel,
        O: Optimizer<M>,
    {
        info!(
            "Dispatching {} sweep units to {} workers.",
            grid.len(),
            self.workers
        );
        reporter.report(Progress::TaskStart {
            total_steps: grid.len() as u64,
        });

        let (task_tx, task_rx) = unbounded::<(usize, f64)>();
        for task in grid.iter().copied().enumerate() {
            if task_tx.send(task).is_err() {
                break;
            }
        }
        drop(task_tx);

        let (result_tx, result_rx) = unbounded::<(usize, UnitOutcome)>();
        let shared = SharedModel::new(base);
        let mut outcomes: Vec<Option<UnitOutcome>> = vec![None; grid.len()];

        let spawned = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.workers);
            for id in 0..self.workers {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                let shared = &shared;
                let worker = thread::Builder::new()
                    .name(format!("sweep-worker-{id}"))
                    .spawn_scoped(scope, move || {
                        for (index, value) in task_rx.iter() {
                            let outcome = adapter.solve_with(|| shared.checkout(), value);
                            if result_tx.send((index, outcome)).is_err() {
                                break;
                            }
                        }
                    });
                match worker {
                    Ok(handle) => handles.push(handle),
                    Err(e) => warn!("Failed to start sweep worker {}: {}", id, e),
                }
            }
            drop(result_tx);

            let spawned = handles.len();
            if spawned > 0 {
                for (index, outcome) in result_rx.iter() {
                    if let Some(slot) = outcomes.get_mut(index) {
                        *slot = Some(outcome);
                    }
                    reporter.report(Progress::TaskIncrement);
                }
            }

            for handle in handles {
                if let Err(payload) = handle.join() {
                    warn!(
                        "A sweep worker terminated abnormally: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
            spawned
        });

        if spawned == 0 {
            return Err(EngineError::WorkerPool(
                "no worker thread could be started".to_string(),
            ));
        }
        debug!("All {} workers joined.", spawned);

        let reports = grid
            .iter()
            .zip(outcomes)
            .map(|(&grid_value, outcome)| {
                let outcome = outcome.unwrap_or_else(|| {
                    reporter.report(Progress::TaskIncrement);
                    UnitOutcome::Failed {
                        reason: LOST_UNIT_REASON.to_string(),
                    }
                });
                UnitReport {
                    grid_value,
                    outcome,
                }
            })
            .collect();
        reporter.report(Progress::TaskFinish);
        Ok(reports)
    }
}
