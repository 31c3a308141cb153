use crate::core::backend::{FitOutcome, Optimizer, SolveError, SolverConfig};
use crate::core::model::BaseModel;
use crate::core::model::bundle::Bundle;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) fn binary_bundle(contact: bool) -> Bundle {
    let bundle = Bundle::new()
        .with_component("binary")
        .with_component("primary")
        .with_component("secondary")
        .with_dataset("lc01", false)
        .with_dataset("rv01", false)
        .with_dataset("mesh01", true)
        .with_parameter("q@binary@orbit@component", 0.5)
        .with_parameter("incl@binary@orbit@component", 80.0)
        .with_parameter("teffratio@binary@orbit@component", 0.9)
        .with_parameter("fillout_factor@contact_envelope@envelope@component", 0.4)
        .with_parameter("requivsumfrac@binary@orbit@component", 0.6)
        .with_parameter("requivratio@binary@orbit@component", 0.8)
        .with_parameter("esinw@binary@orbit@component", 0.0)
        .with_parameter("ecosw@binary@orbit@component", 0.0);
    if contact {
        bundle.with_component("contact_envelope")
    } else {
        bundle
    }
}

/// Deterministic optimizer double: every fitted parameter becomes `q + 1`, and the
/// goodness of fit is the model's current `teffratio`, which shows whether fitted
/// values were adopted before computing it.
#[derive(Default)]
pub(crate) struct ScriptedOptimizer {
    pub fail_at: Vec<f64>,
    pub panic_at: Vec<f64>,
    pub optimize_calls: AtomicUsize,
    pub goodness_calls: AtomicUsize,
}

impl ScriptedOptimizer {
    pub fn failing_at(values: &[f64]) -> Self {
        Self {
            fail_at: values.to_vec(),
            ..Self::default()
        }
    }

    pub fn panicking_at(values: &[f64]) -> Self {
        Self {
            panic_at: values.to_vec(),
            ..Self::default()
        }
    }

    pub fn optimize_calls(&self) -> usize {
        self.optimize_calls.load(Ordering::SeqCst)
    }

    pub fn goodness_calls(&self) -> usize {
        self.goodness_calls.load(Ordering::SeqCst)
    }
}

fn listed(values: &[f64], q: f64) -> bool {
    values.iter().any(|v| (v - q).abs() < 1e-9)
}

impl Optimizer<Bundle> for ScriptedOptimizer {
    fn optimize(&self, model: &Bundle, config: &SolverConfig) -> Result<FitOutcome, SolveError> {
        self.optimize_calls.fetch_add(1, Ordering::SeqCst);
        let q = model.parameter("q")?;
        if listed(&self.panic_at, q) {
            panic!("simplex collapsed at q={q}");
        }
        if listed(&self.fail_at, q) {
            return Err(SolveError::NotConverged {
                iterations: config.max_iterations,
            });
        }
        let enabled_inputs: Vec<&str> = model
            .datasets
            .iter()
            .filter(|d| d.enabled)
            .map(|d| d.name.as_str())
            .collect();
        Ok(FitOutcome {
            fitted_parameters: config
                .fit_parameters
                .iter()
                .map(|p| (p.clone(), q + 1.0))
                .collect(),
            iterations: Some(7),
            objective: Some(q * 100.0),
            state: serde_json::json!({
                "q": q,
                "incl": model.parameter("incl@binary")?,
                "method": config.method,
                "enabled_inputs": enabled_inputs,
            }),
        })
    }

    fn goodness_of_fit(&self, model: &Bundle) -> Result<f64, SolveError> {
        self.goodness_calls.fetch_add(1, Ordering::SeqCst);
        Ok(model.parameter("teffratio")?)
    }
}
